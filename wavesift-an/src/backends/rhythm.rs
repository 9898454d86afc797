//! Tempo estimation backend
//!
//! Onset-strength autocorrelation: spectral flux over short frames, then a
//! periodicity search across the lag range corresponding to the configured
//! BPM bounds. The peak lag is refined by quadratic interpolation.

use rustfft::{num_complex::Complex, FftPlanner};

use super::{ExtractError, TempoEstimator};
use crate::audio::AudioRepresentation;

/// Shipped tempo estimator.
#[derive(Debug, Clone)]
pub struct OnsetAutocorrelation {
    frame_size: usize,
    hop_size: usize,
    min_bpm: f32,
    max_bpm: f32,
}

impl Default for OnsetAutocorrelation {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
        }
    }
}

impl OnsetAutocorrelation {
    /// Half-wave-rectified spectral flux per frame hop.
    fn onset_strength(&self, samples: &[f32]) -> Vec<f32> {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.frame_size);

        let window: Vec<f32> = (0..self.frame_size)
            .map(|i| {
                let x = i as f32 / (self.frame_size - 1) as f32;
                0.5 - 0.5 * (2.0 * std::f32::consts::PI * x).cos()
            })
            .collect();

        let bins = self.frame_size / 2;
        let mut prev_magnitude = vec![0.0f32; bins];
        let mut flux = Vec::new();
        let mut buffer = vec![Complex::new(0.0f32, 0.0f32); self.frame_size];

        for frame in samples.windows(self.frame_size).step_by(self.hop_size) {
            for (i, (&s, &w)) in frame.iter().zip(window.iter()).enumerate() {
                buffer[i] = Complex::new(s * w, 0.0);
            }
            fft.process(&mut buffer);

            let mut frame_flux = 0.0f32;
            for (bin, prev) in prev_magnitude.iter_mut().enumerate() {
                let magnitude = buffer[bin].norm();
                let rise = magnitude - *prev;
                if rise > 0.0 {
                    frame_flux += rise;
                }
                *prev = magnitude;
            }
            flux.push(frame_flux);
        }

        flux
    }

    /// Autocorrelation peak over the lag range implied by the BPM bounds.
    fn best_lag(&self, flux: &[f32], frame_rate: f32) -> Option<f32> {
        let mean = flux.iter().sum::<f32>() / flux.len() as f32;
        let centered: Vec<f32> = flux.iter().map(|&v| v - mean).collect();

        let lag_min = ((frame_rate * 60.0 / self.max_bpm).floor() as usize).max(1);
        let lag_max = (frame_rate * 60.0 / self.min_bpm).ceil() as usize;
        if lag_max + 1 >= centered.len() {
            return None;
        }

        let correlate = |lag: usize| -> f32 {
            centered
                .iter()
                .zip(centered[lag..].iter())
                .map(|(a, b)| a * b)
                .sum()
        };

        let mut peak_lag = 0usize;
        let mut peak_value = f32::MIN;
        for lag in lag_min..=lag_max {
            let value = correlate(lag);
            if value > peak_value {
                peak_value = value;
                peak_lag = lag;
            }
        }

        if peak_value <= 0.0 {
            return None;
        }

        // Quadratic interpolation around the peak for sub-lag precision
        let refined = if peak_lag > lag_min && peak_lag < lag_max {
            let left = correlate(peak_lag - 1);
            let right = correlate(peak_lag + 1);
            let denom = left - 2.0 * peak_value + right;
            if denom.abs() > f32::EPSILON {
                peak_lag as f32 + 0.5 * (left - right) / denom
            } else {
                peak_lag as f32
            }
        } else {
            peak_lag as f32
        };

        Some(refined)
    }
}

impl TempoEstimator for OnsetAutocorrelation {
    fn name(&self) -> &'static str {
        "onset-autocorrelation"
    }

    fn estimate(&self, audio: &AudioRepresentation) -> Result<f32, ExtractError> {
        if audio.channels() != 1 {
            return Err(ExtractError::InvalidInput(format!(
                "tempo estimation requires mono input, got {} channels",
                audio.channels()
            )));
        }
        if audio.samples().len() < self.frame_size * 8 {
            return Err(ExtractError::InvalidInput(format!(
                "signal too short for tempo estimation: {} samples",
                audio.samples().len()
            )));
        }

        let flux = self.onset_strength(audio.samples());
        if flux.iter().all(|&v| v <= f32::EPSILON) {
            return Err(ExtractError::Numeric(
                "no onset energy in signal".to_string(),
            ));
        }

        let frame_rate = audio.sample_rate() as f32 / self.hop_size as f32;
        let lag = self
            .best_lag(&flux, frame_rate)
            .ok_or_else(|| ExtractError::Numeric("no periodicity in onset signal".to_string()))?;

        let bpm = 60.0 * frame_rate / lag;
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(ExtractError::Numeric(format!(
                "degenerate tempo estimate: {bpm}"
            )));
        }

        Ok(bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RepresentationKind;

    fn mono(samples: Vec<f32>, rate: u32) -> AudioRepresentation {
        AudioRepresentation::new(RepresentationKind::RawMono, rate, 1, samples).unwrap()
    }

    /// Click track: short decaying bursts at the given BPM.
    fn click_track(bpm: f32, rate: u32, seconds: f32) -> Vec<f32> {
        let total = (rate as f32 * seconds) as usize;
        let period = (rate as f32 * 60.0 / bpm) as usize;
        let mut samples = vec![0.0f32; total];
        let mut pos = 0;
        while pos < total {
            for i in 0..200.min(total - pos) {
                samples[pos + i] = 0.9 * (-(i as f32) / 40.0).exp();
            }
            pos += period;
        }
        samples
    }

    #[test]
    fn estimates_click_track_tempo() {
        let estimator = OnsetAutocorrelation::default();
        // 25.6 kHz puts the 120 BPM beat period on an exact hop boundary
        let audio = mono(click_track(120.0, 25_600, 8.0), 25_600);

        let bpm = estimator.estimate(&audio).unwrap();
        assert!(bpm > 0.0 && bpm <= 300.0, "bpm out of contract: {bpm}");
        assert!((bpm - 120.0).abs() < 10.0, "expected ~120 BPM, got {bpm}");
    }

    #[test]
    fn silence_is_a_failure_not_zero() {
        let estimator = OnsetAutocorrelation::default();
        let audio = mono(vec![0.0; 22_050 * 4], 22_050);
        assert!(matches!(
            estimator.estimate(&audio),
            Err(ExtractError::Numeric(_))
        ));
    }

    #[test]
    fn rejects_stereo_input() {
        let estimator = OnsetAutocorrelation::default();
        let audio =
            AudioRepresentation::new(RepresentationKind::RawStereo, 44_100, 2, vec![0.0; 88_200])
                .unwrap();
        assert!(matches!(
            estimator.estimate(&audio),
            Err(ExtractError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_short_input() {
        let estimator = OnsetAutocorrelation::default();
        let audio = mono(vec![0.1; 512], 22_050);
        assert!(matches!(
            estimator.estimate(&audio),
            Err(ExtractError::InvalidInput(_))
        ));
    }
}
