//! Feature extractor capability set
//!
//! Each extractor is a swappable backend behind a trait: the pipeline's
//! contract with a backend is purely input shape → output shape plus "may
//! fail". The shipped signal-processing backends live in [`rhythm`],
//! [`tonal`], and [`loudness`]; neural backends are provided by [`onnx`] when
//! the `onnx` feature is enabled.

pub mod loudness;
pub mod rhythm;
pub mod tonal;

#[cfg(feature = "onnx")]
pub mod onnx;

use std::sync::Arc;
use thiserror::Error;

use wavesift_common::descriptors::{EmbeddingSpace, KeyProfile, KeyScale};

use crate::audio::AudioRepresentation;

/// Extraction failure, isolated to the descriptor being computed.
///
/// Distinct from a legitimately produced zero/empty value: an extractor either
/// returns a value satisfying its shape contract or one of these.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// Input did not satisfy the extractor's preconditions
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Output violated the declared shape contract
    #[error("Shape contract violated: {0}")]
    ShapeContract(String),

    /// Numeric failure (NaN, degenerate signal)
    #[error("Numeric failure: {0}")]
    Numeric(String),

    /// Backend/model-level failure
    #[error("Model error: {0}")]
    Model(String),
}

/// A per-frame embedding sequence tagged with its embedding space.
///
/// Frame dimension consistency against the space's contracted length is
/// enforced at construction; an `Embedding` is immutable afterwards.
#[derive(Debug, Clone)]
pub struct Embedding {
    space: EmbeddingSpace,
    frames: Vec<Vec<f32>>,
}

impl Embedding {
    /// Validate and wrap per-frame vectors.
    ///
    /// Fails on an empty frame sequence or any frame whose length differs
    /// from the space's contracted dimension.
    pub fn from_frames(
        space: EmbeddingSpace,
        frames: Vec<Vec<f32>>,
    ) -> Result<Self, ExtractError> {
        if frames.is_empty() {
            return Err(ExtractError::ShapeContract(format!(
                "{space} embedding has no frames"
            )));
        }
        let dim = space.dimension();
        for (i, frame) in frames.iter().enumerate() {
            if frame.len() != dim {
                return Err(ExtractError::ShapeContract(format!(
                    "{space} frame {i} has length {}, contracted {dim}",
                    frame.len()
                )));
            }
        }
        Ok(Self { space, frames })
    }

    pub fn space(&self) -> EmbeddingSpace {
        self.space
    }

    /// Per-dimension vector length.
    pub fn dimension(&self) -> usize {
        self.space.dimension()
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }
}

/// Tempo estimation over mono audio.
pub trait TempoEstimator: Send + Sync {
    /// Backend name, for logging
    fn name(&self) -> &'static str;

    /// Estimate tempo in BPM; the result is contracted positive.
    fn estimate(&self, audio: &AudioRepresentation) -> Result<f32, ExtractError>;
}

/// Key/scale estimation over mono audio, one profile at a time.
///
/// Profiles are independent: the pipeline invokes this once per profile so a
/// single profile's failure never blanks the others.
pub trait KeyEstimator: Send + Sync {
    fn name(&self) -> &'static str;

    fn estimate(
        &self,
        audio: &AudioRepresentation,
        profile: KeyProfile,
    ) -> Result<KeyScale, ExtractError>;
}

/// Integrated loudness metering over stereo audio.
pub trait LoudnessMeter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Integrated loudness in LUFS (commonly negative).
    fn integrated(&self, audio: &AudioRepresentation) -> Result<f32, ExtractError>;
}

/// Neural embedding extraction over resampled mono audio.
pub trait EmbeddingExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// The space this extractor produces frames in.
    fn space(&self) -> EmbeddingSpace;

    fn extract(&self, audio: &AudioRepresentation) -> Result<Embedding, ExtractError>;
}

/// Classification head over a per-frame embedding sequence.
///
/// Returns one activation vector per input frame; the pipeline mean-pools the
/// result into the final descriptor value.
pub trait ActivationHead: Send + Sync {
    fn name(&self) -> &'static str;

    /// Embedding space this head accepts.
    fn input_space(&self) -> EmbeddingSpace;

    /// Contracted activation width, when fixed.
    fn output_width(&self) -> Option<usize>;

    fn infer(&self, embedding: &Embedding) -> Result<Vec<Vec<f32>>, ExtractError>;
}

/// The backends a pipeline runs with.
///
/// Signal-processing backends are always present; neural backends are
/// optional, and an absent backend renders its dependent descriptors skipped,
/// never failed.
#[derive(Clone)]
pub struct BackendSet {
    pub tempo: Arc<dyn TempoEstimator>,
    pub key: Arc<dyn KeyEstimator>,
    pub loudness: Arc<dyn LoudnessMeter>,
    pub discogs: Option<Arc<dyn EmbeddingExtractor>>,
    pub musicnn: Option<Arc<dyn EmbeddingExtractor>>,
    pub music_styles: Option<Arc<dyn ActivationHead>>,
    pub voice_instrumental: Option<Arc<dyn ActivationHead>>,
    pub danceability: Option<Arc<dyn ActivationHead>>,
    pub arousal_valence: Option<Arc<dyn ActivationHead>>,
}

impl BackendSet {
    /// The shipped signal-processing backends, with no neural models attached.
    pub fn signal_only() -> Self {
        Self {
            tempo: Arc::new(rhythm::OnsetAutocorrelation::default()),
            key: Arc::new(tonal::ChromaTemplates::default()),
            loudness: Arc::new(loudness::EbuR128Meter),
            discogs: None,
            musicnn: None,
            music_styles: None,
            voice_instrumental: None,
            danceability: None,
            arousal_valence: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_validates_shape() {
        let ok = Embedding::from_frames(EmbeddingSpace::Discogs, vec![vec![0.0; 512]; 3]);
        assert!(ok.is_ok());
        assert_eq!(ok.unwrap().len(), 3);

        let empty = Embedding::from_frames(EmbeddingSpace::Discogs, vec![]);
        assert!(matches!(empty, Err(ExtractError::ShapeContract(_))));

        let ragged = Embedding::from_frames(
            EmbeddingSpace::Musicnn,
            vec![vec![0.0; 256], vec![0.0; 255]],
        );
        assert!(matches!(ragged, Err(ExtractError::ShapeContract(_))));
    }
}
