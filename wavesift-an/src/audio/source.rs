//! AudioSource: per-stage isolated loading of a source file
//!
//! `load` attempts, in order: full decode, stereo representation, mono
//! downmix, and 16 kHz resample. Each stage is isolated: a failure in stage N
//! is logged with its stage identity and leaves the outputs of stages 1..N-1
//! intact. Nothing raises past this component's boundary.

use std::path::Path;
use tracing::{debug, warn};
use wavesift_common::config::ResamplerQuality;

use super::{decoder, mixer, resampler, AudioRepresentation, RepresentationKind};

/// The representations derived from one source file.
///
/// Every field is independently optional; an absent field means the producing
/// stage (or a prerequisite stage) failed.
#[derive(Debug, Clone, Default)]
pub struct LoadedAudio {
    /// Raw decode, present only for two-channel sources
    pub stereo: Option<AudioRepresentation>,
    /// Equal-weight mono downmix at the source rate
    pub mono: Option<AudioRepresentation>,
    /// Mono resampled to the model input rate
    pub resampled_mono: Option<AudioRepresentation>,
    /// Source sample rate, when the decode recovered one
    pub sample_rate: Option<u32>,
}

impl LoadedAudio {
    /// True when no representation could be produced at all.
    pub fn is_empty(&self) -> bool {
        self.stereo.is_none() && self.mono.is_none() && self.resampled_mono.is_none()
    }
}

/// Loads a file into the representations downstream extractors need.
#[derive(Debug, Clone)]
pub struct AudioSource {
    target_sample_rate: u32,
    quality: ResamplerQuality,
}

impl AudioSource {
    pub fn new(target_sample_rate: u32, quality: ResamplerQuality) -> Self {
        Self {
            target_sample_rate,
            quality,
        }
    }

    /// Load every representation the file supports.
    ///
    /// Decode failure leaves all outputs absent. Downmix failure leaves stereo
    /// intact. Resample failure leaves stereo and mono intact.
    pub fn load(&self, path: &Path) -> LoadedAudio {
        let (samples, sample_rate, channels) = match decoder::decode_file(path) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(stage = "decode", file = %path.display(), reason = %e, "Load stage failed");
                return LoadedAudio::default();
            }
        };

        // Loudness metering needs a true two-channel layout; other layouts
        // still get the mono path.
        let stereo = if channels == 2 {
            AudioRepresentation::new(
                RepresentationKind::RawStereo,
                sample_rate,
                2,
                samples.clone(),
            )
        } else {
            debug!(
                file = %path.display(),
                channels,
                "Source is not two-channel, no stereo representation"
            );
            None
        };

        let mono = match mixer::downmix_mono(&samples, channels) {
            Ok(mono_samples) => AudioRepresentation::new(
                RepresentationKind::RawMono,
                sample_rate,
                1,
                mono_samples,
            ),
            Err(e) => {
                warn!(stage = "downmix", file = %path.display(), reason = %e, "Load stage failed");
                None
            }
        };

        let resampled_mono = mono.as_ref().and_then(|mono| {
            match resampler::resample_mono(
                mono.samples(),
                sample_rate,
                self.target_sample_rate,
                self.quality,
            ) {
                Ok(resampled) => AudioRepresentation::new(
                    RepresentationKind::ResampledMono,
                    self.target_sample_rate,
                    1,
                    resampled,
                ),
                Err(e) => {
                    warn!(stage = "resample", file = %path.display(), reason = %e, "Load stage failed");
                    None
                }
            }
        });

        LoadedAudio {
            stereo,
            mono,
            resampled_mono,
            sample_rate: Some(sample_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_wav(path: &Path, channels: u16, rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let v = ((i as f32 * 0.03).sin() * 10_000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    fn source() -> AudioSource {
        AudioSource::new(16_000, ResamplerQuality::Fast)
    }

    #[test]
    fn stereo_file_yields_all_representations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 44_100, 44_100);

        let loaded = source().load(&path);
        assert!(loaded.stereo.is_some());
        assert!(loaded.mono.is_some());
        assert!(loaded.resampled_mono.is_some());
        assert_eq!(loaded.sample_rate, Some(44_100));

        let resampled = loaded.resampled_mono.unwrap();
        assert_eq!(resampled.sample_rate(), 16_000);
        assert_eq!(resampled.channels(), 1);
        assert_eq!(resampled.kind(), RepresentationKind::ResampledMono);
    }

    #[test]
    fn mono_file_has_no_stereo_representation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 22_050, 22_050);

        let loaded = source().load(&path);
        assert!(loaded.stereo.is_none());
        assert!(loaded.mono.is_some());
        assert!(loaded.resampled_mono.is_some());
    }

    #[test]
    fn decode_failure_leaves_everything_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.flac");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"not a flac stream").unwrap();

        let loaded = source().load(&path);
        assert!(loaded.is_empty());
        assert_eq!(loaded.sample_rate, None);
    }

    #[test]
    fn missing_file_leaves_everything_absent() {
        let loaded = source().load(Path::new("/no/such/audio.mp3"));
        assert!(loaded.is_empty());
    }
}
