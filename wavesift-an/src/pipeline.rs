//! Per-track analysis pipeline
//!
//! Orchestrates AudioSource and the extractor backends over one file and
//! assembles a partial-result [`TrackRecord`]. Every extractor invocation is
//! isolated: representation absence gates which extractors are attempted, an
//! extractor's internal failure populates only its own slot, and no failure
//! aborts the pipeline. CPU-bound work runs on blocking workers under a
//! per-stage timeout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use wavesift_common::config::Config;
use wavesift_common::descriptors::{KeyProfile, KeyScale};

use crate::aggregate::{self, TrackEmbedding};
use crate::audio::{AudioRepresentation, AudioSource};
use crate::backends::{ActivationHead, BackendSet, Embedding, EmbeddingExtractor, ExtractError};

/// One descriptor slot's terminal state.
///
/// `Skipped` means a prerequisite was absent and the extractor was never
/// attempted; `Failed` means the extractor ran and failed. Both carry the
/// reason for the record.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    /// Not attempted: a prerequisite representation/embedding was absent
    Skipped { reason: String },
    /// Attempted and failed
    Failed { reason: String },
    /// Attempted and succeeded
    Value(T),
}

impl<T> Slot<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Slot::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Slot::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Slot::Value(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The skip/failure reason, when absent.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Slot::Skipped { reason } | Slot::Failed { reason } => Some(reason),
            Slot::Value(_) => None,
        }
    }
}

impl<T> From<Result<T, String>> for Slot<T> {
    fn from(result: Result<T, String>) -> Self {
        match result {
            Ok(value) => Slot::Value(value),
            Err(reason) => Slot::Failed { reason },
        }
    }
}

/// Everything computed for one file.
///
/// Each slot is written exactly once, by exactly one extractor; a failing
/// extractor never removes or corrupts a sibling slot.
#[derive(Debug, Clone)]
pub struct TrackRecord {
    pub path: PathBuf,
    pub tempo: Slot<f32>,
    /// Per-profile key estimates; profiles are isolated, so individual
    /// profiles inside a computed mapping may still be absent.
    pub key: Slot<BTreeMap<KeyProfile, Option<KeyScale>>>,
    pub loudness: Slot<f32>,
    pub discogs_embedding: Slot<TrackEmbedding>,
    pub musicnn_embedding: Slot<TrackEmbedding>,
    pub music_styles: Slot<Vec<f32>>,
    pub voice_or_instrument: Slot<Vec<f32>>,
    pub danceability: Slot<Vec<f32>>,
    pub arousal_and_valence: Slot<Vec<f32>>,
}

impl TrackRecord {
    /// Names of the contracted descriptors present in this record.
    pub fn present_descriptors(&self) -> Vec<&'static str> {
        let mut present = Vec::new();
        if self.tempo.is_value() {
            present.push("tempo");
        }
        if self.key.is_value() {
            present.push("key");
        }
        if self.loudness.is_value() {
            present.push("loudness");
        }
        if self.music_styles.is_value() {
            present.push("music_styles");
        }
        if self.voice_or_instrument.is_value() {
            present.push("voice_or_instrument");
        }
        if self.danceability.is_value() {
            present.push("danceability");
        }
        if self.arousal_and_valence.is_value() {
            present.push("arousal_and_valence");
        }
        present
    }
}

/// Per-file orchestration of AudioSource plus the extractor backends.
pub struct TrackAnalysisPipeline {
    source: AudioSource,
    backends: BackendSet,
    stage_timeout: Duration,
}

impl TrackAnalysisPipeline {
    /// `stage_timeout` of zero disables the per-stage budget.
    pub fn new(source: AudioSource, backends: BackendSet, stage_timeout: Duration) -> Self {
        Self {
            source,
            backends,
            stage_timeout,
        }
    }

    pub fn from_config(config: &Config, backends: BackendSet) -> Self {
        Self::new(
            AudioSource::new(
                config.audio.target_sample_rate,
                config.audio.resampler_quality,
            ),
            backends,
            Duration::from_secs(config.analysis.stage_timeout_secs),
        )
    }

    /// Analyze one file into a TrackRecord. Never fails: every per-stage
    /// failure is converted to an absent slot with its reason.
    pub async fn analyze(&self, path: &Path) -> TrackRecord {
        debug!(file = %path.display(), "Analyzing track");

        let loaded = self.load_audio(path).await;
        let stereo = loaded.stereo.map(Arc::new);
        let mono = loaded.mono.map(Arc::new);
        let resampled = loaded.resampled_mono.map(Arc::new);

        let tempo = match &mono {
            Some(mono) => {
                let backend = self.backends.tempo.clone();
                let mono = mono.clone();
                self.run_stage(path, "tempo", move || backend.estimate(&mono))
                    .await
                    .into()
            }
            None => Slot::skipped("mono representation absent"),
        };

        let key = match &mono {
            Some(mono) => {
                // Profiles are independent: one failing never blanks the rest
                let mut estimates = BTreeMap::new();
                for profile in KeyProfile::ALL {
                    let backend = self.backends.key.clone();
                    let mono = mono.clone();
                    let stage = format!("key:{profile}");
                    let result = self
                        .run_stage(path, &stage, move || backend.estimate(&mono, profile))
                        .await;
                    estimates.insert(profile, result.ok());
                }
                Slot::Value(estimates)
            }
            None => Slot::skipped("mono representation absent"),
        };

        let loudness = match &stereo {
            Some(stereo) => {
                let backend = self.backends.loudness.clone();
                let stereo = stereo.clone();
                self.run_stage(path, "loudness", move || backend.integrated(&stereo))
                    .await
                    .into()
            }
            None => Slot::skipped("stereo representation absent"),
        };

        let (discogs_frames, discogs_embedding) = self
            .extract_embedding(path, "discogs", self.backends.discogs.clone(), &resampled)
            .await;
        let (musicnn_frames, musicnn_embedding) = self
            .extract_embedding(path, "musicnn", self.backends.musicnn.clone(), &resampled)
            .await;

        let music_styles = self
            .run_head(
                path,
                "music_styles",
                self.backends.music_styles.clone(),
                &discogs_frames,
                "discogs embedding absent",
            )
            .await;
        let voice_or_instrument = self
            .run_head(
                path,
                "voice_or_instrument",
                self.backends.voice_instrumental.clone(),
                &discogs_frames,
                "discogs embedding absent",
            )
            .await;
        let danceability = self
            .run_head(
                path,
                "danceability",
                self.backends.danceability.clone(),
                &discogs_frames,
                "discogs embedding absent",
            )
            .await;
        let arousal_and_valence = self
            .run_head(
                path,
                "arousal_and_valence",
                self.backends.arousal_valence.clone(),
                &musicnn_frames,
                "musicnn embedding absent",
            )
            .await;

        TrackRecord {
            path: path.to_path_buf(),
            tempo,
            key,
            loudness,
            discogs_embedding,
            musicnn_embedding,
            music_styles,
            voice_or_instrument,
            danceability,
            arousal_and_valence,
        }
    }

    /// Load representations on a blocking worker, under the stage budget.
    async fn load_audio(&self, path: &Path) -> crate::audio::LoadedAudio {
        let source = self.source.clone();
        let owned_path = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || source.load(&owned_path));

        let joined = if self.stage_timeout.is_zero() {
            task.await
        } else {
            match timeout(self.stage_timeout, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        stage = "load",
                        file = %path.display(),
                        timeout_secs = self.stage_timeout.as_secs(),
                        "Load stage exceeded its budget"
                    );
                    return Default::default();
                }
            }
        };

        match joined {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(stage = "load", file = %path.display(), reason = %e, "Load worker failed");
                Default::default()
            }
        }
    }

    /// Run one extractor on a blocking worker; convert every failure mode
    /// (extractor error, panic, timeout) into a reason string.
    async fn run_stage<T, F>(&self, path: &Path, stage: &str, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ExtractError> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);

        let joined = if self.stage_timeout.is_zero() {
            task.await
        } else {
            match timeout(self.stage_timeout, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    let reason = format!(
                        "timed out after {}s",
                        self.stage_timeout.as_secs()
                    );
                    warn!(stage, file = %path.display(), reason = %reason, "Extractor exceeded its budget");
                    return Err(reason);
                }
            }
        };

        match joined {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(stage, file = %path.display(), reason = %e, "Extractor failed");
                Err(e.to_string())
            }
            Err(e) => {
                let reason = format!("extractor worker panicked: {e}");
                warn!(stage, file = %path.display(), reason = %reason, "Extractor worker failed");
                Err(reason)
            }
        }
    }

    /// Produce one embedding space: the per-frame sequence (for downstream
    /// heads) and the mean-pooled track embedding slot.
    async fn extract_embedding(
        &self,
        path: &Path,
        stage: &str,
        backend: Option<Arc<dyn EmbeddingExtractor>>,
        resampled: &Option<Arc<AudioRepresentation>>,
    ) -> (Option<Arc<Embedding>>, Slot<TrackEmbedding>) {
        let Some(backend) = backend else {
            return (None, Slot::skipped("embedding model unavailable"));
        };
        let Some(audio) = resampled else {
            return (None, Slot::skipped("resampled mono representation absent"));
        };

        let audio = audio.clone();
        let stage_name = format!("embedding:{stage}");
        let result = self
            .run_stage(path, &stage_name, move || backend.extract(&audio))
            .await;

        match result {
            Ok(embedding) => {
                let embedding = Arc::new(embedding);
                let slot = match aggregate::pool_embedding(&embedding) {
                    Ok(track_embedding) => Slot::Value(track_embedding),
                    Err(e) => {
                        warn!(
                            stage = %stage_name,
                            file = %path.display(),
                            reason = %e,
                            "Embedding aggregation failed"
                        );
                        Slot::failed(e.to_string())
                    }
                };
                (Some(embedding), slot)
            }
            Err(reason) => (None, Slot::Failed { reason }),
        }
    }

    /// Run one classification head over a per-frame embedding and mean-pool
    /// its activations.
    async fn run_head(
        &self,
        path: &Path,
        stage: &'static str,
        head: Option<Arc<dyn ActivationHead>>,
        embedding: &Option<Arc<Embedding>>,
        missing_embedding_reason: &'static str,
    ) -> Slot<Vec<f32>> {
        let Some(head) = head else {
            return Slot::skipped("classification model unavailable");
        };
        let Some(embedding) = embedding else {
            return Slot::skipped(missing_embedding_reason);
        };

        let embedding = embedding.clone();
        self.run_stage(path, stage, move || {
            let activations = head.infer(&embedding)?;
            aggregate::mean_pool(&activations)
                .map_err(|e| ExtractError::ShapeContract(e.to_string()))
        })
        .await
        .into()
    }
}
