//! Audio loading and representation derivation
//!
//! A source file is decoded once and derived into up to three immutable
//! representations: the raw stereo decode, an equal-weight mono downmix, and a
//! 16 kHz resampled mono version for the neural models. Derivation never
//! mutates an existing representation.

pub mod decoder;
pub mod mixer;
pub mod resampler;
pub mod source;

pub use source::{AudioSource, LoadedAudio};

/// Which derived form of the source samples a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepresentationKind {
    /// Raw decode of a two-channel source
    RawStereo,
    /// Equal-weight mono downmix at the source sample rate
    RawMono,
    /// Mono resampled to the neural model input rate
    ResampledMono,
}

/// An immutable buffer of decoded samples.
///
/// Channel count and sample rate are fixed at construction; resampling or
/// downmixing produces a new representation rather than mutating this one.
#[derive(Debug, Clone)]
pub struct AudioRepresentation {
    kind: RepresentationKind,
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl AudioRepresentation {
    /// Wrap an interleaved sample buffer.
    ///
    /// Returns `None` for a zero sample rate, zero channels, or a sample count
    /// that is not a whole number of frames.
    pub fn new(
        kind: RepresentationKind,
        sample_rate: u32,
        channels: u16,
        samples: Vec<f32>,
    ) -> Option<Self> {
        if sample_rate == 0 || channels == 0 || samples.len() % channels as usize != 0 {
            return None;
        }
        Some(Self {
            kind,
            sample_rate,
            channels,
            samples,
        })
    }

    pub fn kind(&self) -> RepresentationKind {
        self.kind
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of per-channel frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn representation_rejects_partial_frames() {
        assert!(AudioRepresentation::new(RepresentationKind::RawStereo, 44_100, 2, vec![0.0; 5])
            .is_none());
        assert!(AudioRepresentation::new(RepresentationKind::RawMono, 0, 1, vec![0.0; 4]).is_none());
        let repr =
            AudioRepresentation::new(RepresentationKind::RawStereo, 44_100, 2, vec![0.0; 6])
                .unwrap();
        assert_eq!(repr.frames(), 3);
    }
}
