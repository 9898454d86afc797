//! Mono resampling using rubato
//!
//! Converts the mono downmix to the fixed neural model input rate. Two quality
//! tiers are offered: a polynomial resampler (default) and a band-limited sinc
//! resampler.

use rubato::{
    FastFixedIn, PolynomialDegree, Resampler as RubatoResampler, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;
use tracing::debug;
use wavesift_common::config::ResamplerQuality;

/// Resampling errors
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Empty input buffer")]
    EmptyInput,

    #[error("Invalid sample rate: {0}")]
    InvalidRate(u32),

    #[error("Resampling failed: {0}")]
    Failed(String),
}

/// Resample mono samples from `input_rate` to `output_rate`.
///
/// Returns a copy when the rates already match.
pub fn resample_mono(
    input: &[f32],
    input_rate: u32,
    output_rate: u32,
    quality: ResamplerQuality,
) -> Result<Vec<f32>, ResampleError> {
    if input.is_empty() {
        return Err(ResampleError::EmptyInput);
    }
    if input_rate == 0 {
        return Err(ResampleError::InvalidRate(input_rate));
    }
    if output_rate == 0 {
        return Err(ResampleError::InvalidRate(output_rate));
    }
    if input_rate == output_rate {
        debug!("Sample rate already at {}Hz, skipping resample", output_rate);
        return Ok(input.to_vec());
    }

    debug!(
        "Resampling from {}Hz to {}Hz ({:?} tier)",
        input_rate, output_rate, quality
    );

    let ratio = output_rate as f64 / input_rate as f64;
    let chunk_size = input.len();
    let planar_input = vec![input.to_vec()];

    let planar_output = match quality {
        ResamplerQuality::Fast => {
            let mut resampler =
                FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, chunk_size, 1)
                    .map_err(|e| ResampleError::Failed(e.to_string()))?;
            resampler
                .process(&planar_input, None)
                .map_err(|e| ResampleError::Failed(e.to_string()))?
        }
        ResamplerQuality::Sinc => {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk_size, 1)
                .map_err(|e| ResampleError::Failed(e.to_string()))?;
            resampler
                .process(&planar_input, None)
                .map_err(|e| ResampleError::Failed(e.to_string()))?
        }
    };

    let output = planar_output
        .into_iter()
        .next()
        .ok_or_else(|| ResampleError::Failed("resampler produced no channels".to_string()))?;

    debug!(
        "Resampled {} input frames to {} output frames",
        chunk_size,
        output.len()
    );

    Ok(output)
}
