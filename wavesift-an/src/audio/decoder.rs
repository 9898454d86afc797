//! Audio decoding using symphonia
//!
//! Decodes a whole file (MP3, FLAC, OGG, WAV, AAC) to interleaved f32 PCM at
//! the source sample rate and channel layout.

use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

/// Decode errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Cannot open the source file
    #[error("Failed to open {0}: {1}")]
    Open(String, String),

    /// Container or codec not recognized
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Stream carried no decodable audio track
    #[error("No audio track found")]
    NoAudioTrack,

    /// Track parameters missing or packet decode failed
    #[error("Decode failed: {0}")]
    Failed(String),
}

/// Decode an entire audio file to PCM samples.
///
/// # Returns
/// - `samples`: interleaved f32 samples in the source channel layout
/// - `sample_rate`: source sample rate
/// - `channels`: source channel count
pub fn decode_file(path: &Path) -> Result<(Vec<f32>, u32, u16), DecodeError> {
    debug!(file = %path.display(), "Decoding file");

    let file = std::fs::File::open(path)
        .map_err(|e| DecodeError::Open(path.display().to_string(), e.to_string()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Hint the probe with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Failed("sample rate not found".to_string()))?;
    let channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| DecodeError::Failed("channel count not found".to_string()))?;
    if channels == 0 {
        return Err(DecodeError::Failed("zero channel count".to_string()));
    }

    debug!(sample_rate, channels, "Audio format");

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Failed(format!("failed to create decoder: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                debug!("Reached end of file");
                break;
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Error reading packet");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
                });
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(e) => {
                // Tolerate corrupt packets mid-stream
                warn!(file = %path.display(), error = %e, "Decode error, skipping packet");
                continue;
            }
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Failed("no samples decoded".to_string()));
    }

    debug!(
        samples = samples.len(),
        frames = samples.len() / channels as usize,
        "Decoded file"
    );

    Ok((samples, sample_rate, channels))
}
