//! Integrated loudness backend
//!
//! EBU R128 integrated loudness (LUFS) over the stereo representation, via the
//! `ebur128` meter.

use ebur128::{EbuR128, Mode};

use super::{ExtractError, LoudnessMeter};
use crate::audio::AudioRepresentation;

/// Shipped loudness meter.
#[derive(Debug, Clone, Copy)]
pub struct EbuR128Meter;

impl LoudnessMeter for EbuR128Meter {
    fn name(&self) -> &'static str {
        "ebur128"
    }

    fn integrated(&self, audio: &AudioRepresentation) -> Result<f32, ExtractError> {
        if audio.channels() != 2 {
            return Err(ExtractError::InvalidInput(format!(
                "loudness metering requires stereo input, got {} channels",
                audio.channels()
            )));
        }

        let mut meter = EbuR128::new(2, audio.sample_rate(), Mode::I)
            .map_err(|e| ExtractError::Model(format!("failed to create meter: {e}")))?;

        meter
            .add_frames_f32(audio.samples())
            .map_err(|e| ExtractError::Model(format!("metering failed: {e}")))?;

        let lufs = meter
            .loudness_global()
            .map_err(|e| ExtractError::Model(format!("integrated loudness failed: {e}")))?;

        // Silence or sub-gating-threshold signals yield -inf; report that as a
        // failure rather than a value.
        if !lufs.is_finite() {
            return Err(ExtractError::Numeric(
                "signal below the integrated gating threshold".to_string(),
            ));
        }

        Ok(lufs as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RepresentationKind;

    fn stereo_sine(rate: u32, seconds: f32, amplitude: f32) -> AudioRepresentation {
        let total = (rate as f32 * seconds) as usize;
        let mut samples = Vec::with_capacity(total * 2);
        for i in 0..total {
            let t = i as f32 / rate as f32;
            let v = amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            samples.push(v);
            samples.push(v);
        }
        AudioRepresentation::new(RepresentationKind::RawStereo, rate, 2, samples).unwrap()
    }

    #[test]
    fn sine_has_finite_negative_loudness() {
        let meter = EbuR128Meter;
        let audio = stereo_sine(44_100, 3.0, 0.25);

        let lufs = meter.integrated(&audio).unwrap();
        assert!(lufs.is_finite());
        assert!(lufs < 0.0, "expected negative LUFS, got {lufs}");
        assert!(lufs > -70.0, "implausibly quiet: {lufs}");
    }

    #[test]
    fn louder_signal_measures_louder() {
        let meter = EbuR128Meter;
        let quiet = meter.integrated(&stereo_sine(44_100, 3.0, 0.05)).unwrap();
        let loud = meter.integrated(&stereo_sine(44_100, 3.0, 0.5)).unwrap();
        assert!(loud > quiet);
    }

    #[test]
    fn silence_is_a_failure_not_a_value() {
        let meter = EbuR128Meter;
        let audio = AudioRepresentation::new(
            RepresentationKind::RawStereo,
            44_100,
            2,
            vec![0.0; 44_100 * 4],
        )
        .unwrap();
        assert!(matches!(
            meter.integrated(&audio),
            Err(ExtractError::Numeric(_))
        ));
    }

    #[test]
    fn rejects_mono_input() {
        let meter = EbuR128Meter;
        let audio =
            AudioRepresentation::new(RepresentationKind::RawMono, 44_100, 1, vec![0.1; 44_100])
                .unwrap();
        assert!(matches!(
            meter.integrated(&audio),
            Err(ExtractError::InvalidInput(_))
        ));
    }
}
