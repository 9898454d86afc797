//! Neural inference backends (ONNX)
//!
//! Embedding models consume fixed-length windows of 16 kHz mono audio and emit
//! one or more embedding frames per window; classification heads consume a
//! per-frame embedding matrix and emit one activation row per frame. Both are
//! opaque scoring functions: wavesift validates shapes at the boundary and
//! treats everything inside the session as a black box.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use tracing::{info, warn};

use wavesift_common::config::ModelsConfig;
use wavesift_common::descriptors::EmbeddingSpace;

use super::{ActivationHead, BackendSet, Embedding, EmbeddingExtractor, ExtractError};
use crate::audio::AudioRepresentation;

fn build_session(path: &Path) -> Result<(Session, String), ExtractError> {
    let session = Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|b| b.with_intra_threads(1))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| ExtractError::Model(format!("cannot load {}: {e}", path.display())))?;

    let output_name = session
        .outputs
        .first()
        .map(|o| o.name.clone())
        .ok_or_else(|| {
            ExtractError::Model(format!("{} declares no outputs", path.display()))
        })?;

    Ok((session, output_name))
}

/// Run a session on a 2-D input and return (rows, row_width, data).
fn run_2d(
    session: &Mutex<Session>,
    output_name: &str,
    input: Array2<f32>,
) -> Result<(usize, usize, Vec<f32>), ExtractError> {
    let value = Value::from_array(input)
        .map_err(|e| ExtractError::Model(format!("input tensor rejected: {e}")))?;

    let mut session = session
        .lock()
        .map_err(|_| ExtractError::Model("inference session poisoned".to_string()))?;

    let outputs = session
        .run(ort::inputs![value])
        .map_err(|e| ExtractError::Model(format!("inference failed: {e}")))?;

    let (shape, data) = outputs[output_name]
        .try_extract_tensor::<f32>()
        .map_err(|e| ExtractError::Model(format!("output tensor extraction failed: {e}")))?;

    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    let width = dims.last().copied().unwrap_or(0);
    if width == 0 || data.is_empty() || data.len() % width != 0 {
        return Err(ExtractError::ShapeContract(format!(
            "output shape {dims:?} is not a row matrix"
        )));
    }

    Ok((data.len() / width, width, data.to_vec()))
}

/// Embedding model session.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    output_name: String,
    space: EmbeddingSpace,
    window_secs: f32,
}

impl OnnxEmbedder {
    /// Load an embedding model for the given space.
    pub fn from_file(path: &Path, space: EmbeddingSpace) -> Result<Self, ExtractError> {
        let (session, output_name) = build_session(path)?;
        info!(model = %path.display(), space = %space, "Loaded embedding model");
        Ok(Self {
            session: Mutex::new(session),
            output_name,
            space,
            window_secs: match space {
                EmbeddingSpace::Discogs => 2.0,
                EmbeddingSpace::Musicnn => 3.0,
            },
        })
    }

    /// Zero-padded fixed-length windows over the mono samples.
    fn windows(&self, samples: &[f32], sample_rate: u32) -> Vec<Vec<f32>> {
        let window_len = ((sample_rate as f32 * self.window_secs) as usize).max(1);
        let mut windows = Vec::new();
        for chunk in samples.chunks(window_len) {
            // Drop a trailing sliver once at least one full window exists
            if !windows.is_empty() && chunk.len() < window_len / 2 {
                break;
            }
            let mut window = chunk.to_vec();
            window.resize(window_len, 0.0);
            windows.push(window);
        }
        windows
    }
}

impl EmbeddingExtractor for OnnxEmbedder {
    fn name(&self) -> &'static str {
        "onnx-embedder"
    }

    fn space(&self) -> EmbeddingSpace {
        self.space
    }

    fn extract(&self, audio: &AudioRepresentation) -> Result<Embedding, ExtractError> {
        if audio.channels() != 1 {
            return Err(ExtractError::InvalidInput(format!(
                "embedding extraction requires mono input, got {} channels",
                audio.channels()
            )));
        }
        if audio.samples().is_empty() {
            return Err(ExtractError::InvalidInput("empty signal".to_string()));
        }

        let expected = self.space.dimension();
        let mut frames = Vec::new();

        for window in self.windows(audio.samples(), audio.sample_rate()) {
            let len = window.len();
            let input = Array2::from_shape_vec((1, len), window)
                .map_err(|e| ExtractError::Model(format!("window reshape failed: {e}")))?;

            let (rows, width, data) = run_2d(&self.session, &self.output_name, input)?;
            if width != expected {
                return Err(ExtractError::ShapeContract(format!(
                    "{} model emitted {width}-dim frames, contracted {expected}",
                    self.space
                )));
            }
            for row in 0..rows {
                frames.push(data[row * width..(row + 1) * width].to_vec());
            }
        }

        Embedding::from_frames(self.space, frames)
    }
}

/// Classification head session.
pub struct OnnxHead {
    session: Mutex<Session>,
    output_name: String,
    name: &'static str,
    input_space: EmbeddingSpace,
    width: usize,
}

impl OnnxHead {
    pub fn from_file(
        path: &Path,
        name: &'static str,
        input_space: EmbeddingSpace,
        width: usize,
    ) -> Result<Self, ExtractError> {
        let (session, output_name) = build_session(path)?;
        info!(model = %path.display(), head = name, "Loaded classification head");
        Ok(Self {
            session: Mutex::new(session),
            output_name,
            name,
            input_space,
            width,
        })
    }
}

impl ActivationHead for OnnxHead {
    fn name(&self) -> &'static str {
        self.name
    }

    fn input_space(&self) -> EmbeddingSpace {
        self.input_space
    }

    fn output_width(&self) -> Option<usize> {
        Some(self.width)
    }

    fn infer(&self, embedding: &Embedding) -> Result<Vec<Vec<f32>>, ExtractError> {
        if embedding.space() != self.input_space {
            return Err(ExtractError::InvalidInput(format!(
                "{} head expects {} embeddings, got {}",
                self.name,
                self.input_space,
                embedding.space()
            )));
        }

        let frames = embedding.len();
        let dim = embedding.dimension();
        let flat: Vec<f32> = embedding.frames().iter().flatten().copied().collect();
        let input = Array2::from_shape_vec((frames, dim), flat)
            .map_err(|e| ExtractError::Model(format!("embedding reshape failed: {e}")))?;

        let (rows, width, data) = run_2d(&self.session, &self.output_name, input)?;
        if width != self.width {
            return Err(ExtractError::ShapeContract(format!(
                "{} head emitted width {width}, contracted {}",
                self.name, self.width
            )));
        }

        Ok((0..rows)
            .map(|row| data[row * width..(row + 1) * width].to_vec())
            .collect())
    }
}

/// Attach whichever configured models load successfully.
///
/// A missing or unloadable model logs a warning and leaves that backend
/// absent; dependent descriptors will be recorded skipped.
pub fn attach_models(set: &mut BackendSet, models: &ModelsConfig) {
    let embedder = |model: &Path, space| match OnnxEmbedder::from_file(&models.resolve(model), space)
    {
        Ok(e) => Some(Arc::new(e) as Arc<dyn EmbeddingExtractor>),
        Err(e) => {
            warn!(space = %space, reason = %e, "Embedding model unavailable");
            None
        }
    };
    set.discogs = embedder(&models.discogs_embedding, EmbeddingSpace::Discogs);
    set.musicnn = embedder(&models.musicnn_embedding, EmbeddingSpace::Musicnn);

    let head = |model: &Path, name, space, width| match OnnxHead::from_file(
        &models.resolve(model),
        name,
        space,
        width,
    ) {
        Ok(h) => Some(Arc::new(h) as Arc<dyn ActivationHead>),
        Err(e) => {
            warn!(head = name, reason = %e, "Classification head unavailable");
            None
        }
    };
    set.music_styles = head(
        &models.music_styles_head,
        "music-styles",
        EmbeddingSpace::Discogs,
        400,
    );
    set.voice_instrumental = head(
        &models.voice_instrumental_head,
        "voice-instrumental",
        EmbeddingSpace::Discogs,
        2,
    );
    set.danceability = head(
        &models.danceability_head,
        "danceability",
        EmbeddingSpace::Discogs,
        2,
    );
    set.arousal_valence = head(
        &models.arousal_valence_head,
        "arousal-valence",
        EmbeddingSpace::Musicnn,
        2,
    );
}
