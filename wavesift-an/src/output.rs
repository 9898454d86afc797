//! Persisted output assembly
//!
//! Converts the in-memory collection table into the two wire-format tables
//! (predictions and mean-pooled embeddings) and writes them as JSON under the
//! configured output directories.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

use wavesift_common::config::CollectionConfig;
use wavesift_common::tables::{
    save_embeddings, save_predictions, EmbeddingsRecord, EmbeddingsTable, KeyMap,
    PredictionsRecord, PredictionsTable,
};
use wavesift_common::Result;

use crate::collection::CollectionTable;
use crate::pipeline::{Slot, TrackRecord};

/// File name of the serialized embeddings table.
pub const EMBEDDINGS_FILE: &str = "audio_embeddings.json";
/// File name of the serialized predictions table.
pub const PREDICTIONS_FILE: &str = "audio_predictions.json";

/// A completed run, for the closing log line.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: usize,
    pub descriptors_computed: usize,
    pub descriptors_absent: usize,
}

impl RunSummary {
    pub fn of(table: &CollectionTable, started_at: DateTime<Utc>) -> Self {
        let mut computed = 0;
        let mut absent = 0;
        for record in table.values() {
            let present = record.present_descriptors().len();
            computed += present;
            absent += wavesift_common::descriptors::DESCRIPTOR_NAMES.len() - present;
        }
        Self {
            started_at,
            finished_at: Utc::now(),
            files: table.len(),
            descriptors_computed: computed,
            descriptors_absent: absent,
        }
    }
}

/// One record's predictions wire form.
pub fn predictions_record(record: &TrackRecord) -> PredictionsRecord {
    let key = record.key.value().map(|estimates| {
        estimates
            .iter()
            .map(|(profile, estimate)| (profile.as_str().to_string(), estimate.clone()))
            .collect::<KeyMap>()
    });

    PredictionsRecord {
        tempo: record.tempo.clone().into_option(),
        key,
        loudness: record.loudness.clone().into_option(),
        music_styles: record.music_styles.clone().into_option(),
        voice_or_instrument: record.voice_or_instrument.clone().into_option(),
        danceability: record.danceability.clone().into_option(),
        arousal_and_valence: record.arousal_and_valence.clone().into_option(),
    }
}

/// One record's embeddings wire form.
pub fn embeddings_record(record: &TrackRecord) -> EmbeddingsRecord {
    let vector_of = |slot: &Slot<crate::aggregate::TrackEmbedding>| {
        slot.value().map(|embedding| embedding.vector().to_vec())
    };
    EmbeddingsRecord {
        discogs_embeddings: vector_of(&record.discogs_embedding),
        musicnn_embeddings: vector_of(&record.musicnn_embedding),
    }
}

/// Build both wire tables in walk order.
pub fn build_tables(table: &CollectionTable) -> (PredictionsTable, EmbeddingsTable) {
    let mut predictions = PredictionsTable::with_capacity(table.len());
    let mut embeddings = EmbeddingsTable::with_capacity(table.len());

    for (path, record) in table {
        let key = path.to_string_lossy().into_owned();
        predictions.insert(key.clone(), predictions_record(record));
        embeddings.insert(key, embeddings_record(record));
    }

    (predictions, embeddings)
}

/// Write both tables, returning their paths.
pub fn write_tables(
    config: &CollectionConfig,
    table: &CollectionTable,
) -> Result<(PathBuf, PathBuf)> {
    let (predictions, embeddings) = build_tables(table);

    let predictions_path = config.predictions_dir.join(PREDICTIONS_FILE);
    let embeddings_path = config.embeddings_dir.join(EMBEDDINGS_FILE);

    save_predictions(&predictions_path, &predictions)?;
    save_embeddings(&embeddings_path, &embeddings)?;

    info!(
        predictions = %predictions_path.display(),
        embeddings = %embeddings_path.display(),
        tracks = table.len(),
        "Wrote analysis tables"
    );

    Ok((predictions_path, embeddings_path))
}
