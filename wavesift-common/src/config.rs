//! Configuration loading and resolution
//!
//! Configuration is resolved with the priority order:
//! 1. Explicit path from the command line (highest priority, must exist)
//! 2. `WAVESIFT_CONFIG` environment variable
//! 3. Platform config file (`~/.config/wavesift/config.toml` on Linux)
//! 4. Compiled defaults (fallback)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV_VAR: &str = "WAVESIFT_CONFIG";

/// Resampler quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplerQuality {
    /// Polynomial interpolation, good quality/performance tradeoff
    Fast,
    /// Band-limited sinc interpolation, highest quality, higher CPU cost
    Sinc,
}

impl Default for ResamplerQuality {
    fn default() -> Self {
        ResamplerQuality::Fast
    }
}

/// Top-level configuration for the wavesift tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub collection: CollectionConfig,
    pub audio: AudioConfig,
    pub analysis: AnalysisConfig,
    pub models: ModelsConfig,
}

/// Collection roots and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Root directory scanned for audio files
    pub root: PathBuf,
    /// Directory receiving `audio_embeddings.json`
    pub embeddings_dir: PathBuf,
    /// Directory receiving `audio_predictions.json`
    pub predictions_dir: PathBuf,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            embeddings_dir: PathBuf::from("embeddings"),
            predictions_dir: PathBuf::from("predictions"),
        }
    }
}

/// Audio loading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the resampled mono representation (Hz)
    pub target_sample_rate: u32,
    /// Resampler quality tier
    pub resampler_quality: ResamplerQuality,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            resampler_quality: ResamplerQuality::default(),
        }
    }
}

/// Pipeline execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Budget for a single extractor invocation, in seconds
    pub stage_timeout_secs: u64,
    /// Files analyzed concurrently; 0 = one per available core
    pub jobs: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: 120,
            jobs: 0,
        }
    }
}

impl AnalysisConfig {
    /// Concrete worker count after resolving `jobs == 0`.
    pub fn effective_jobs(&self) -> usize {
        if self.jobs > 0 {
            self.jobs
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// Neural model locations.
///
/// Paths are resolved relative to `dir` unless absolute. A missing model file
/// disables the extractors depending on it; it never fails the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding the model files
    pub dir: PathBuf,
    /// Discogs-EffNet embedding model
    pub discogs_embedding: PathBuf,
    /// MusiCNN embedding model
    pub musicnn_embedding: PathBuf,
    /// 400-class music style head (Discogs embedding input)
    pub music_styles_head: PathBuf,
    /// Voice/instrumental head (Discogs embedding input)
    pub voice_instrumental_head: PathBuf,
    /// Danceability head (Discogs embedding input)
    pub danceability_head: PathBuf,
    /// Arousal/valence head (MusiCNN embedding input)
    pub arousal_valence_head: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            discogs_embedding: PathBuf::from("discogs-effnet-bs64-1.onnx"),
            musicnn_embedding: PathBuf::from("msd-musicnn-1.onnx"),
            music_styles_head: PathBuf::from("genre_discogs400-discogs-effnet-1.onnx"),
            voice_instrumental_head: PathBuf::from("voice_instrumental-discogs-effnet-1.onnx"),
            danceability_head: PathBuf::from("danceability-discogs-effnet-1.onnx"),
            arousal_valence_head: PathBuf::from("emomusic-msd-musicnn-2.onnx"),
        }
    }
}

impl ModelsConfig {
    /// Resolve a model path against the models directory.
    pub fn resolve(&self, model: &Path) -> PathBuf {
        if model.is_absolute() {
            model.to_path_buf()
        } else {
            self.dir.join(model)
        }
    }
}

impl Config {
    /// Load configuration following the resolution priority order.
    ///
    /// An explicitly given path (CLI or env) must exist; the platform config
    /// file is optional and compiled defaults apply when it is missing.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            info!(config = %path.display(), "Loading configuration from command line path");
            return Self::from_file(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            info!(config = %env_path, "Loading configuration from {CONFIG_ENV_VAR}");
            return Self::from_file(Path::new(&env_path));
        }

        if let Some(path) = Self::platform_config_path() {
            if path.exists() {
                info!(config = %path.display(), "Loading platform configuration file");
                return Self::from_file(&path);
            }
            debug!(config = %path.display(), "No platform configuration file, using defaults");
        }

        Ok(Self::default())
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid TOML in {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Platform-dependent default config file location.
    pub fn platform_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("wavesift").join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.audio.target_sample_rate == 0 {
            return Err(Error::Config(
                "audio.target_sample_rate must be positive".to_string(),
            ));
        }
        if self.analysis.stage_timeout_secs == 0 {
            warn!("analysis.stage_timeout_secs is 0; extractor timeouts are disabled");
        }
        Ok(())
    }
}
