//! Key estimation backend
//!
//! Average chroma over short frames, then template correlation against the
//! requested key profile, rotated through all 12 tonics in both modes. Each
//! profile is evaluated independently by the pipeline.

use rustfft::{num_complex::Complex, FftPlanner};

use super::{ExtractError, KeyEstimator};
use crate::audio::AudioRepresentation;
use wavesift_common::descriptors::{KeyProfile, KeyScale};

const KEY_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

// Template weights per pitch class relative to the tonic.
const TEMPERLEY_MAJOR: [f32; 12] = [
    5.0, 2.0, 3.5, 2.0, 4.5, 4.0, 2.0, 4.5, 2.0, 3.5, 1.5, 4.0,
];
const TEMPERLEY_MINOR: [f32; 12] = [
    5.0, 2.0, 3.5, 4.5, 2.0, 4.0, 2.0, 4.5, 3.5, 2.0, 1.5, 4.0,
];
const KRUMHANSL_MAJOR: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const KRUMHANSL_MINOR: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];
const EDMA_MAJOR: [f32; 12] = [
    0.1652, 0.0475, 0.0829, 0.0669, 0.0999, 0.0927, 0.0529, 0.1316, 0.0522, 0.0744, 0.0694,
    0.0643,
];
const EDMA_MINOR: [f32; 12] = [
    0.1724, 0.0534, 0.0761, 0.1004, 0.0562, 0.0853, 0.0498, 0.1345, 0.0746, 0.0500, 0.0919,
    0.0555,
];

/// Shipped key estimator.
#[derive(Debug, Clone)]
pub struct ChromaTemplates {
    frame_size: usize,
    hop_size: usize,
    min_freq: f32,
    max_freq: f32,
}

impl Default for ChromaTemplates {
    fn default() -> Self {
        Self {
            frame_size: 4096,
            hop_size: 2048,
            min_freq: 50.0,
            max_freq: 5_000.0,
        }
    }
}

impl ChromaTemplates {
    /// Frame-averaged 12-bin chroma, C-based indexing.
    fn chroma(&self, samples: &[f32], sample_rate: u32) -> [f32; 12] {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.frame_size);

        let window: Vec<f32> = (0..self.frame_size)
            .map(|i| {
                let x = i as f32 / (self.frame_size - 1) as f32;
                0.5 - 0.5 * (2.0 * std::f32::consts::PI * x).cos()
            })
            .collect();

        let bin_width = sample_rate as f32 / self.frame_size as f32;
        let mut chroma = [0.0f32; 12];
        let mut buffer = vec![Complex::new(0.0f32, 0.0f32); self.frame_size];

        for frame in samples.windows(self.frame_size).step_by(self.hop_size) {
            for (i, (&s, &w)) in frame.iter().zip(window.iter()).enumerate() {
                buffer[i] = Complex::new(s * w, 0.0);
            }
            fft.process(&mut buffer);

            for bin in 1..self.frame_size / 2 {
                let freq = bin as f32 * bin_width;
                if freq < self.min_freq || freq > self.max_freq {
                    continue;
                }
                // MIDI note number; C maps to pitch class 0
                let midi = 69.0 + 12.0 * (freq / 440.0).log2();
                let pitch_class = (midi.round() as i32).rem_euclid(12) as usize;
                chroma[pitch_class] += buffer[bin].norm();
            }
        }

        chroma
    }

    fn profile_templates(profile: KeyProfile) -> (&'static [f32; 12], &'static [f32; 12]) {
        match profile {
            KeyProfile::Temperley => (&TEMPERLEY_MAJOR, &TEMPERLEY_MINOR),
            KeyProfile::Krumhansl => (&KRUMHANSL_MAJOR, &KRUMHANSL_MINOR),
            KeyProfile::Edma => (&EDMA_MAJOR, &EDMA_MINOR),
        }
    }
}

/// Pearson correlation between a chroma vector and a profile rotated to `tonic`.
fn rotated_correlation(chroma: &[f32; 12], profile: &[f32; 12], tonic: usize) -> f32 {
    let chroma_mean = chroma.iter().sum::<f32>() / 12.0;
    let profile_mean = profile.iter().sum::<f32>() / 12.0;

    let mut covariance = 0.0f32;
    let mut chroma_var = 0.0f32;
    let mut profile_var = 0.0f32;

    for pc in 0..12 {
        let c = chroma[(pc + tonic) % 12] - chroma_mean;
        let p = profile[pc] - profile_mean;
        covariance += c * p;
        chroma_var += c * c;
        profile_var += p * p;
    }

    let denom = (chroma_var * profile_var).sqrt();
    if denom <= f32::EPSILON {
        return f32::NEG_INFINITY;
    }
    covariance / denom
}

impl KeyEstimator for ChromaTemplates {
    fn name(&self) -> &'static str {
        "chroma-templates"
    }

    fn estimate(
        &self,
        audio: &AudioRepresentation,
        profile: KeyProfile,
    ) -> Result<KeyScale, ExtractError> {
        if audio.channels() != 1 {
            return Err(ExtractError::InvalidInput(format!(
                "key estimation requires mono input, got {} channels",
                audio.channels()
            )));
        }
        if audio.samples().len() < self.frame_size {
            return Err(ExtractError::InvalidInput(format!(
                "signal too short for key estimation: {} samples",
                audio.samples().len()
            )));
        }

        let chroma = self.chroma(audio.samples(), audio.sample_rate());
        if chroma.iter().all(|&v| v <= f32::EPSILON) {
            return Err(ExtractError::Numeric(
                "no tonal energy in signal".to_string(),
            ));
        }

        let (major, minor) = Self::profile_templates(profile);

        let mut best: Option<(f32, usize, &'static str)> = None;
        for tonic in 0..12 {
            for (template, scale) in [(major, "major"), (minor, "minor")] {
                let score = rotated_correlation(&chroma, template, tonic);
                if best.map_or(true, |(b, _, _)| score > b) {
                    best = Some((score, tonic, scale));
                }
            }
        }

        let (score, tonic, scale) =
            best.ok_or_else(|| ExtractError::Numeric("no key candidate scored".to_string()))?;
        if !score.is_finite() {
            return Err(ExtractError::Numeric(
                "degenerate chroma distribution".to_string(),
            ));
        }

        Ok(KeyScale::new(KEY_NAMES[tonic], scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RepresentationKind;

    fn mono(samples: Vec<f32>, rate: u32) -> AudioRepresentation {
        AudioRepresentation::new(RepresentationKind::RawMono, rate, 1, samples).unwrap()
    }

    /// C major triad with the tonic emphasized.
    fn c_major_triad(rate: u32, seconds: f32) -> Vec<f32> {
        let total = (rate as f32 * seconds) as usize;
        (0..total)
            .map(|i| {
                let t = i as f32 / rate as f32;
                let tau = 2.0 * std::f32::consts::PI * t;
                0.5 * (tau * 261.63).sin() + 0.3 * (tau * 329.63).sin() + 0.3 * (tau * 392.0).sin()
            })
            .collect()
    }

    #[test]
    fn c_major_triad_is_c_for_every_profile() {
        let estimator = ChromaTemplates::default();
        let audio = mono(c_major_triad(22_050, 3.0), 22_050);

        for profile in KeyProfile::ALL {
            let estimate = estimator.estimate(&audio, profile).unwrap();
            assert_eq!(estimate.key, "C", "profile {profile} picked {estimate:?}");
        }
    }

    #[test]
    fn krumhansl_identifies_major_mode() {
        let estimator = ChromaTemplates::default();
        let audio = mono(c_major_triad(22_050, 3.0), 22_050);
        let estimate = estimator.estimate(&audio, KeyProfile::Krumhansl).unwrap();
        assert_eq!(estimate, KeyScale::new("C", "major"));
    }

    #[test]
    fn silence_is_a_failure() {
        let estimator = ChromaTemplates::default();
        let audio = mono(vec![0.0; 22_050 * 2], 22_050);
        assert!(matches!(
            estimator.estimate(&audio, KeyProfile::Edma),
            Err(ExtractError::Numeric(_))
        ));
    }

    #[test]
    fn rejects_short_input() {
        let estimator = ChromaTemplates::default();
        let audio = mono(vec![0.1; 1024], 22_050);
        assert!(matches!(
            estimator.estimate(&audio, KeyProfile::Temperley),
            Err(ExtractError::InvalidInput(_))
        ));
    }
}
