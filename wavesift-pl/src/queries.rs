//! Descriptor filtering and ranking
//!
//! Pure queries over the predictions table. A track whose relevant descriptor
//! is absent (`null` in the table) is excluded by any filter or ranking that
//! needs it; absence is never treated as zero.

use tracing::debug;

use wavesift_common::descriptors::KeyProfile;
use wavesift_common::tables::{GenreMetadata, PredictionsRecord, PredictionsTable};
use wavesift_common::{Error, Result};

/// Voice/instrumental classification outcome, by activation argmax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voicing {
    Instrumental,
    Vocal,
}

/// Descriptor to rank a playlist by, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Tempo,
    Danceability,
    Arousal,
    Valence,
}

/// Conjunctive descriptor filter; unset fields match everything.
#[derive(Debug, Clone)]
pub struct DescriptorFilter {
    pub tempo_min: Option<f32>,
    pub tempo_max: Option<f32>,
    pub loudness_min: Option<f32>,
    pub loudness_max: Option<f32>,
    /// Key name to match, e.g. "C"
    pub key: Option<String>,
    /// Scale name to match, "major" or "minor"
    pub scale: Option<String>,
    /// Profile the key/scale match reads; edma has the most even
    /// distributions, so it is the default.
    pub key_profile: KeyProfile,
    /// Genre name whose activation must reach `min_genre_activation`
    pub genre: Option<String>,
    pub min_genre_activation: f32,
    pub voicing: Option<Voicing>,
}

impl Default for DescriptorFilter {
    fn default() -> Self {
        Self {
            tempo_min: None,
            tempo_max: None,
            loudness_min: None,
            loudness_max: None,
            key: None,
            scale: None,
            key_profile: KeyProfile::Edma,
            genre: None,
            min_genre_activation: 0.1,
            voicing: None,
        }
    }
}

impl DescriptorFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Paths passing the filter, in table order.
pub fn filter_tracks(
    table: &PredictionsTable,
    filter: &DescriptorFilter,
    genres: Option<&GenreMetadata>,
) -> Result<Vec<String>> {
    let genre_index = match &filter.genre {
        Some(genre) => {
            let metadata = genres.ok_or_else(|| {
                Error::InvalidInput(
                    "genre filtering requires the genre metadata file".to_string(),
                )
            })?;
            let index = metadata
                .classes
                .iter()
                .position(|name| name == genre)
                .ok_or_else(|| Error::InvalidInput(format!("unknown genre: {genre}")))?;
            Some(index)
        }
        None => None,
    };

    let mut matched = Vec::new();
    for (path, record) in table {
        if record_matches(record, filter, genre_index) {
            matched.push(path.clone());
        }
    }
    debug!(
        matched = matched.len(),
        total = table.len(),
        "Filtered predictions table"
    );
    Ok(matched)
}

fn record_matches(
    record: &PredictionsRecord,
    filter: &DescriptorFilter,
    genre_index: Option<usize>,
) -> bool {
    if filter.tempo_min.is_some() || filter.tempo_max.is_some() {
        let Some(tempo) = record.tempo else {
            return false;
        };
        if filter.tempo_min.is_some_and(|min| tempo < min) {
            return false;
        }
        if filter.tempo_max.is_some_and(|max| tempo > max) {
            return false;
        }
    }

    if filter.loudness_min.is_some() || filter.loudness_max.is_some() {
        let Some(loudness) = record.loudness else {
            return false;
        };
        if filter.loudness_min.is_some_and(|min| loudness < min) {
            return false;
        }
        if filter.loudness_max.is_some_and(|max| loudness > max) {
            return false;
        }
    }

    if filter.key.is_some() || filter.scale.is_some() {
        let estimate = record
            .key
            .as_ref()
            .and_then(|key| key.get(filter.key_profile.as_str()))
            .and_then(|estimate| estimate.as_ref());
        let Some(estimate) = estimate else {
            return false;
        };
        if filter
            .key
            .as_ref()
            .is_some_and(|wanted| &estimate.key != wanted)
        {
            return false;
        }
        if filter
            .scale
            .as_ref()
            .is_some_and(|wanted| &estimate.scale != wanted)
        {
            return false;
        }
    }

    if let Some(index) = genre_index {
        let Some(activations) = record.music_styles.as_ref() else {
            return false;
        };
        let Some(&activation) = activations.get(index) else {
            return false;
        };
        if activation < filter.min_genre_activation {
            return false;
        }
    }

    if let Some(wanted) = filter.voicing {
        let Some(voicing) = classify_voicing(record) else {
            return false;
        };
        if voicing != wanted {
            return false;
        }
    }

    true
}

/// Argmax of the `[instrumental, voice]` activations, when present.
pub fn classify_voicing(record: &PredictionsRecord) -> Option<Voicing> {
    let activations = record.voice_or_instrument.as_ref()?;
    if activations.len() != 2 {
        return None;
    }
    if activations[1] > activations[0] {
        Some(Voicing::Vocal)
    } else {
        Some(Voicing::Instrumental)
    }
}

/// The scalar a ranking reads from one record, when present.
fn ranking_score(record: &PredictionsRecord, rank_by: RankBy) -> Option<f32> {
    match rank_by {
        RankBy::Tempo => record.tempo,
        // [danceable, not danceable]
        RankBy::Danceability => record.danceability.as_ref()?.first().copied(),
        // [valence, arousal]
        RankBy::Valence => record.arousal_and_valence.as_ref()?.first().copied(),
        RankBy::Arousal => record.arousal_and_valence.as_ref()?.get(1).copied(),
    }
}

/// Order `paths` by the ranking descriptor, descending; tracks missing the
/// descriptor are dropped from the ranking.
pub fn rank_tracks(table: &PredictionsTable, paths: &[String], rank_by: RankBy) -> Vec<String> {
    let mut scored: Vec<(String, f32)> = paths
        .iter()
        .filter_map(|path| {
            let record = table.get(path)?;
            ranking_score(record, rank_by).map(|score| (path.clone(), score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(path, _)| path).collect()
}

/// Dominant genre per track: argmax over the music style activations.
pub fn dominant_genres(
    table: &PredictionsTable,
    genres: &GenreMetadata,
) -> Vec<(String, String)> {
    let mut result = Vec::new();
    for (path, record) in table {
        let Some(activations) = record.music_styles.as_ref() else {
            continue;
        };
        let best = activations
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((index, _)) = best {
            if let Some(name) = genres.classes.get(index) {
                result.push((path.clone(), name.clone()));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavesift_common::descriptors::KeyScale;
    use wavesift_common::tables::KeyMap;

    fn record(
        tempo: Option<f32>,
        loudness: Option<f32>,
        edma: Option<KeyScale>,
        danceable: Option<f32>,
    ) -> PredictionsRecord {
        let key = edma.map(|estimate| {
            let mut map = KeyMap::new();
            map.insert("temperley".to_string(), Some(KeyScale::new("A", "minor")));
            map.insert("krumhansl".to_string(), None);
            map.insert("edma".to_string(), Some(estimate));
            map
        });
        PredictionsRecord {
            music_styles: tempo.map(|_| vec![0.05, 0.6, 0.35]),
            voice_or_instrument: tempo.map(|_| vec![0.7, 0.3]),
            arousal_and_valence: tempo.map(|_| vec![4.0, 6.0]),
            danceability: danceable.map(|d| vec![d, 1.0 - d]),
            tempo,
            key,
            loudness,
        }
    }

    fn table() -> PredictionsTable {
        let mut table = PredictionsTable::new();
        table.insert(
            "a.mp3".to_string(),
            record(Some(120.0), Some(-9.0), Some(KeyScale::new("C", "major")), Some(0.9)),
        );
        table.insert(
            "b.mp3".to_string(),
            record(Some(87.0), Some(-14.0), Some(KeyScale::new("G", "minor")), Some(0.3)),
        );
        table.insert("c.mp3".to_string(), record(None, None, None, None));
        table
    }

    fn genres() -> GenreMetadata {
        GenreMetadata {
            classes: vec![
                "Blues".to_string(),
                "Electronic".to_string(),
                "Rock".to_string(),
            ],
        }
    }

    #[test]
    fn tempo_range_excludes_absent_descriptors() {
        let mut filter = DescriptorFilter::new();
        filter.tempo_min = Some(100.0);

        let matched = filter_tracks(&table(), &filter, None).unwrap();
        assert_eq!(matched, vec!["a.mp3"]);
    }

    #[test]
    fn key_filter_reads_the_selected_profile() {
        let mut filter = DescriptorFilter::new();
        filter.key = Some("G".to_string());
        filter.scale = Some("minor".to_string());

        let matched = filter_tracks(&table(), &filter, None).unwrap();
        assert_eq!(matched, vec!["b.mp3"]);

        // Same key under temperley: every record says A minor there
        filter.key_profile = KeyProfile::Temperley;
        let matched = filter_tracks(&table(), &filter, None).unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn genre_filter_requires_metadata() {
        let mut filter = DescriptorFilter::new();
        filter.genre = Some("Electronic".to_string());

        assert!(matches!(
            filter_tracks(&table(), &filter, None),
            Err(Error::InvalidInput(_))
        ));

        filter.min_genre_activation = 0.5;
        let matched = filter_tracks(&table(), &filter, Some(&genres())).unwrap();
        assert_eq!(matched, vec!["a.mp3", "b.mp3"]);
    }

    #[test]
    fn unknown_genre_is_rejected() {
        let mut filter = DescriptorFilter::new();
        filter.genre = Some("Vaporwave".to_string());
        assert!(matches!(
            filter_tracks(&table(), &filter, Some(&genres())),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn ranking_is_descending_and_drops_absent() {
        let table = table();
        let paths: Vec<String> = table.keys().cloned().collect();

        let by_tempo = rank_tracks(&table, &paths, RankBy::Tempo);
        assert_eq!(by_tempo, vec!["a.mp3", "b.mp3"]);

        let by_dance = rank_tracks(&table, &paths, RankBy::Danceability);
        assert_eq!(by_dance, vec!["a.mp3", "b.mp3"]);
    }

    #[test]
    fn voicing_classification_by_argmax() {
        let with_activations = record(Some(100.0), None, None, None);
        assert_eq!(
            classify_voicing(&with_activations),
            Some(Voicing::Instrumental)
        );
        // Absent activations classify as nothing, not as instrumental
        assert_eq!(classify_voicing(&record(None, None, None, None)), None);
    }

    #[test]
    fn dominant_genre_is_activation_argmax() {
        let labelled = dominant_genres(&table(), &genres());
        // The record with no activations is left out
        assert_eq!(labelled.len(), 2);
        assert!(labelled
            .iter()
            .all(|(_, genre)| genre == "Electronic"));
    }
}
