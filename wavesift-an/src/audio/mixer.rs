//! Channel-aware mono downmix
//!
//! Mirrors the source channel layout into a single channel: mono input passes
//! through, multichannel input is averaged per frame with equal weights.

use thiserror::Error;

/// Downmix errors
#[derive(Debug, Error)]
pub enum MixError {
    #[error("Zero channel count")]
    ZeroChannels,

    #[error("Sample count {0} is not a whole number of {1}-channel frames")]
    PartialFrame(usize, u16),
}

/// Mix interleaved samples down to mono with equal channel weights.
pub fn downmix_mono(samples: &[f32], channels: u16) -> Result<Vec<f32>, MixError> {
    if channels == 0 {
        return Err(MixError::ZeroChannels);
    }
    let num_channels = channels as usize;
    if samples.len() % num_channels != 0 {
        return Err(MixError::PartialFrame(samples.len(), channels));
    }

    if channels == 1 {
        return Ok(samples.to_vec());
    }

    let scale = 1.0 / num_channels as f32;
    let mono = samples
        .chunks_exact(num_channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect();

    Ok(mono)
}
