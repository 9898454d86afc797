//! Persisted table wire formats
//!
//! Two JSON documents keyed by file path, produced by the analyzer and read by
//! the playlist tools:
//!
//! - predictions table: path → one [`PredictionsRecord`] with a fixed field
//!   set; a descriptor that was not computed is serialized as `null`, never as
//!   a zero/empty stand-in.
//! - embeddings table: path → per-space mean-pooled track embedding, `null`
//!   when the space was not produced.
//!
//! Entry order is the analyzer's directory-walk order (not semantically
//! significant, but preserved on round-trip).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::descriptors::KeyScale;
use crate::{Error, Result};

/// Key mapping wire form: profile name → estimate or `null`.
///
/// When key extraction was attempted, the map carries exactly the three
/// contracted profile names; profiles that individually failed are `null`.
pub type KeyMap = BTreeMap<String, Option<KeyScale>>;

/// One track's serialized descriptor set.
///
/// Field names and `null`-for-absent semantics are the wire contract; every
/// record carries the full field set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionsRecord {
    /// Estimated tempo in BPM
    pub tempo: Option<f32>,
    /// Key and scale per extraction profile
    pub key: Option<KeyMap>,
    /// Integrated loudness (LUFS)
    pub loudness: Option<f32>,
    /// Per-class music style activations (mean-pooled)
    pub music_styles: Option<Vec<f32>>,
    /// `[instrumental, voice]` softmax (mean-pooled)
    pub voice_or_instrument: Option<Vec<f32>>,
    /// `[danceable, not danceable]` softmax (mean-pooled)
    pub danceability: Option<Vec<f32>>,
    /// `[valence, arousal]` predictions (mean-pooled)
    pub arousal_and_valence: Option<Vec<f32>>,
}

/// One track's serialized mean-pooled embeddings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsRecord {
    /// Mean-pooled Discogs-EffNet track embedding (512 dims)
    pub discogs_embeddings: Option<Vec<f32>>,
    /// Mean-pooled MusiCNN track embedding (256 dims)
    #[serde(rename = "musiCNN_embeddings")]
    pub musicnn_embeddings: Option<Vec<f32>>,
}

/// Predictions table: path → descriptor record, in walk order.
pub type PredictionsTable = IndexMap<String, PredictionsRecord>;

/// Embeddings table: path → embeddings record, in walk order.
pub type EmbeddingsTable = IndexMap<String, EmbeddingsRecord>;

/// Load a predictions table from a JSON file.
pub fn load_predictions(path: &Path) -> Result<PredictionsTable> {
    load_json(path)
}

/// Write a predictions table to a JSON file.
pub fn save_predictions(path: &Path, table: &PredictionsTable) -> Result<()> {
    save_json(path, table)
}

/// Load an embeddings table from a JSON file.
pub fn load_embeddings(path: &Path) -> Result<EmbeddingsTable> {
    load_json(path)
}

/// Write an embeddings table to a JSON file.
pub fn save_embeddings(path: &Path, table: &EmbeddingsTable) -> Result<()> {
    save_json(path, table)
}

/// Discogs-EffNet model metadata, used to map music style activation indices
/// to human-readable genre names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreMetadata {
    /// Class names in activation index order
    pub classes: Vec<String>,
}

impl GenreMetadata {
    /// Load genre class names from a model metadata JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let metadata: GenreMetadata = load_json(path)?;
        if metadata.classes.is_empty() {
            return Err(Error::InvalidInput(format!(
                "genre metadata {} has an empty class list",
                path.display()
            )));
        }
        Ok(metadata)
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        Error::NotFound(format!("cannot open {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> PredictionsRecord {
        let mut key = KeyMap::new();
        key.insert("temperley".to_string(), Some(KeyScale::new("C", "major")));
        key.insert("krumhansl".to_string(), Some(KeyScale::new("C", "major")));
        key.insert("edma".to_string(), None);
        PredictionsRecord {
            tempo: Some(120.5),
            key: Some(key),
            loudness: Some(-9.2),
            music_styles: Some(vec![0.1, 0.7, 0.2]),
            voice_or_instrument: Some(vec![0.8, 0.2]),
            danceability: None,
            arousal_and_valence: Some(vec![5.1, 4.9]),
        }
    }

    #[test]
    fn absent_descriptors_serialize_as_null() {
        let record = sample_record();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("danceability").unwrap().is_null());
        // Per-profile isolation: one failed profile is null, siblings survive
        let key = json.get("key").unwrap();
        assert!(key.get("edma").unwrap().is_null());
        assert_eq!(key.get("temperley").unwrap()[0], "C");
    }

    #[test]
    fn predictions_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions").join("audio_predictions.json");

        let mut table = PredictionsTable::new();
        table.insert("data/b.mp3".to_string(), sample_record());
        table.insert("data/a.wav".to_string(), PredictionsRecord::default());

        save_predictions(&path, &table).unwrap();
        let loaded = load_predictions(&path).unwrap();

        assert_eq!(loaded, table);
        // Insertion order preserved, not lexicographic
        let keys: Vec<_> = loaded.keys().cloned().collect();
        assert_eq!(keys, vec!["data/b.mp3", "data/a.wav"]);
    }

    #[test]
    fn embeddings_record_wire_field_names() {
        let record = EmbeddingsRecord {
            discogs_embeddings: Some(vec![0.5; 4]),
            musicnn_embeddings: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("discogs_embeddings").is_some());
        assert!(json.get("musiCNN_embeddings").unwrap().is_null());
    }

    #[test]
    fn missing_table_file_is_not_found() {
        let err = load_predictions(Path::new("/no/such/table.json")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
