//! Nearest-neighbor similarity over track embeddings
//!
//! Ranks tracks by the dot product between mean-pooled track embeddings of
//! one embedding space. The query track itself is excluded from its own
//! ranking; tracks without an embedding in the chosen space are skipped.

use tracing::warn;

use wavesift_common::descriptors::EmbeddingSpace;
use wavesift_common::tables::{EmbeddingsRecord, EmbeddingsTable};
use wavesift_common::{Error, Result};

fn space_vector<'a>(record: &'a EmbeddingsRecord, space: EmbeddingSpace) -> Option<&'a [f32]> {
    match space {
        EmbeddingSpace::Discogs => record.discogs_embeddings.as_deref(),
        EmbeddingSpace::Musicnn => record.musicnn_embeddings.as_deref(),
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Tracks most similar to `query`, descending by dot product.
pub fn most_similar(
    table: &EmbeddingsTable,
    query: &str,
    space: EmbeddingSpace,
    top_n: usize,
) -> Result<Vec<(String, f32)>> {
    let query_record = table
        .get(query)
        .ok_or_else(|| Error::NotFound(format!("track not in embeddings table: {query}")))?;
    let query_vector = space_vector(query_record, space).ok_or_else(|| {
        Error::InvalidInput(format!("track has no {space} embedding: {query}"))
    })?;

    let mut scored: Vec<(String, f32)> = Vec::new();
    for (path, record) in table {
        if path == query {
            continue;
        }
        let Some(vector) = space_vector(record, space) else {
            continue;
        };
        if vector.len() != query_vector.len() {
            warn!(
                track = %path,
                expected = query_vector.len(),
                actual = vector.len(),
                "Embedding length mismatch, skipping track"
            );
            continue;
        }
        scored.push((path.clone(), dot(query_vector, vector)));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_n);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(discogs: Option<Vec<f32>>) -> EmbeddingsRecord {
        EmbeddingsRecord {
            discogs_embeddings: discogs,
            musicnn_embeddings: None,
        }
    }

    fn table() -> EmbeddingsTable {
        let mut table = EmbeddingsTable::new();
        table.insert("query.mp3".to_string(), record(Some(vec![1.0, 0.0])));
        table.insert("aligned.mp3".to_string(), record(Some(vec![0.9, 0.1])));
        table.insert("orthogonal.mp3".to_string(), record(Some(vec![0.0, 1.0])));
        table.insert("opposite.mp3".to_string(), record(Some(vec![-1.0, 0.0])));
        table.insert("missing.mp3".to_string(), record(None));
        table
    }

    #[test]
    fn ranking_is_descending_and_excludes_query() {
        let ranked = most_similar(&table(), "query.mp3", EmbeddingSpace::Discogs, 10).unwrap();
        let names: Vec<_> = ranked.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(names, vec!["aligned.mp3", "orthogonal.mp3", "opposite.mp3"]);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn top_n_truncates() {
        let ranked = most_similar(&table(), "query.mp3", EmbeddingSpace::Discogs, 1).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "aligned.mp3");
    }

    #[test]
    fn unknown_query_is_not_found() {
        assert!(matches!(
            most_similar(&table(), "nope.mp3", EmbeddingSpace::Discogs, 5),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn query_without_space_embedding_is_invalid() {
        assert!(matches!(
            most_similar(&table(), "missing.mp3", EmbeddingSpace::Discogs, 5),
            Err(Error::InvalidInput(_))
        ));
        // Same track, different space: nothing in the table has musicnn
        assert!(matches!(
            most_similar(&table(), "query.mp3", EmbeddingSpace::Musicnn, 5),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn mismatched_lengths_are_skipped() {
        let mut table = table();
        table.insert(
            "short.mp3".to_string(),
            record(Some(vec![1.0])),
        );
        let ranked = most_similar(&table, "query.mp3", EmbeddingSpace::Discogs, 10).unwrap();
        assert!(ranked.iter().all(|(path, _)| path != "short.mp3"));
    }
}
