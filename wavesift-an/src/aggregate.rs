//! Mean-pooling of frame-level model outputs
//!
//! Collapses a per-frame matrix (embedding frames or classification-head
//! activations) into a single vector: the arithmetic mean across the frame
//! axis, preserving per-dimension length. Defined only for non-empty,
//! rectangular input; an empty or ragged sequence is a reported failure,
//! never a NaN-producing mean.

use thiserror::Error;

use wavesift_common::descriptors::EmbeddingSpace;

use crate::backends::Embedding;

/// Aggregation failures
#[derive(Debug, Clone, Error)]
pub enum AggregateError {
    /// Zero frames: the mean is undefined
    #[error("Cannot pool an empty frame sequence")]
    Empty,

    /// Frame lengths disagree
    #[error("Ragged frame sequence: frame {index} has length {actual}, expected {expected}")]
    Ragged {
        index: usize,
        actual: usize,
        expected: usize,
    },
}

/// Mean across the frame axis.
///
/// Accepts any positive frame count; the frame count itself does not appear
/// in the output shape.
pub fn mean_pool(frames: &[Vec<f32>]) -> Result<Vec<f32>, AggregateError> {
    let first = frames.first().ok_or(AggregateError::Empty)?;
    let dim = first.len();
    if dim == 0 {
        return Err(AggregateError::Ragged {
            index: 0,
            actual: 0,
            expected: 1,
        });
    }

    let mut sums = vec![0.0f64; dim];
    for (index, frame) in frames.iter().enumerate() {
        if frame.len() != dim {
            return Err(AggregateError::Ragged {
                index,
                actual: frame.len(),
                expected: dim,
            });
        }
        for (sum, &value) in sums.iter_mut().zip(frame.iter()) {
            *sum += value as f64;
        }
    }

    let count = frames.len() as f64;
    Ok(sums.into_iter().map(|sum| (sum / count) as f32).collect())
}

/// A mean-pooled, single-vector track summary of an [`Embedding`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEmbedding {
    space: EmbeddingSpace,
    vector: Vec<f32>,
}

impl TrackEmbedding {
    pub fn space(&self) -> EmbeddingSpace {
        self.space
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn into_vector(self) -> Vec<f32> {
        self.vector
    }
}

/// Pool a per-frame embedding into its track summary.
pub fn pool_embedding(embedding: &Embedding) -> Result<TrackEmbedding, AggregateError> {
    let vector = mean_pool(embedding.frames())?;
    Ok(TrackEmbedding {
        space: embedding.space(),
        vector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_pool_is_per_dimension_mean() {
        let frames = vec![
            vec![1.0, 2.0, 30.0],
            vec![3.0, 4.0, -10.0],
            vec![5.0, 6.0, 10.0],
        ];
        let pooled = mean_pool(&frames).unwrap();
        assert_eq!(pooled.len(), 3);
        let expected = [3.0f32, 4.0, 10.0];
        for (i, (&got, &want)) in pooled.iter().zip(expected.iter()).enumerate() {
            assert!((got - want).abs() < 1e-6, "dim {i}: {got} != {want}");
        }
    }

    #[test]
    fn single_frame_pools_to_itself() {
        let frames = vec![vec![0.25, -0.5]];
        assert_eq!(mean_pool(&frames).unwrap(), vec![0.25, -0.5]);
    }

    #[test]
    fn empty_sequence_is_rejected() {
        assert!(matches!(mean_pool(&[]), Err(AggregateError::Empty)));
    }

    #[test]
    fn ragged_sequence_is_rejected() {
        let frames = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            mean_pool(&frames),
            Err(AggregateError::Ragged {
                index: 1,
                actual: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn pooled_embedding_keeps_space_and_dimension() {
        let embedding = Embedding::from_frames(
            EmbeddingSpace::Musicnn,
            vec![vec![1.0; 256], vec![3.0; 256]],
        )
        .unwrap();
        let track = pool_embedding(&embedding).unwrap();
        assert_eq!(track.space(), EmbeddingSpace::Musicnn);
        assert_eq!(track.vector().len(), 256);
        assert!(track.vector().iter().all(|&v| (v - 2.0).abs() < 1e-6));
    }
}
