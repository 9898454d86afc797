//! Collection analysis
//!
//! Walks a corpus root for audio files, runs the per-track pipeline over each
//! through a bounded worker pool, and accumulates a table keyed by path in
//! walk order. A file whose entire pipeline fails still gets exactly one
//! all-absent entry; only structural problems (missing or non-directory root)
//! fail the run itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::pipeline::{TrackAnalysisPipeline, TrackRecord};

/// Extension allow-list for corpus discovery.
pub const AUDIO_EXTENSIONS: [&str; 5] = ["wav", "mp3", "ogg", "flac", "aac"];

/// Structural scan errors, fatal to a collection run.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified root does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Root exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Path → TrackRecord, in walk order.
pub type CollectionTable = IndexMap<PathBuf, TrackRecord>;

/// Walks a corpus and runs the pipeline per file.
pub struct CollectionAnalyzer {
    pipeline: Arc<TrackAnalysisPipeline>,
    jobs: usize,
    ignore_patterns: Vec<String>,
}

impl CollectionAnalyzer {
    pub fn new(pipeline: TrackAnalysisPipeline, jobs: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            jobs: jobs.max(1),
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
        }
    }

    /// Enumerate audio files under the root, sorted per directory for a
    /// deterministic walk order.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut files = Vec::new();
        let mut symlink_visited = HashSet::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.should_process_entry(entry, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_audio_extension(entry.path()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    // Continue scanning, don't abort
                    warn!("Error accessing entry: {}", e);
                }
            }
        }

        debug!(files = files.len(), root = %root.display(), "Scan complete");
        Ok(files)
    }

    /// Analyze every discovered file into the collection table.
    pub async fn analyze(&self, root: &Path) -> Result<CollectionTable, ScanError> {
        let files = self.scan(root)?;
        info!(
            files = files.len(),
            root = %root.display(),
            jobs = self.jobs,
            "Analyzing collection"
        );

        // Bounded fan-out; `buffered` keeps completion in walk order
        let records: Vec<TrackRecord> = stream::iter(files)
            .map(|path| {
                let pipeline = self.pipeline.clone();
                async move { pipeline.analyze(&path).await }
            })
            .buffered(self.jobs)
            .collect()
            .await;

        let mut table = CollectionTable::with_capacity(records.len());
        for record in records {
            table.insert(record.path.clone(), record);
        }
        Ok(table)
    }

    fn should_process_entry(
        &self,
        entry: &DirEntry,
        symlink_visited: &mut HashSet<PathBuf>,
    ) -> bool {
        let file_name = entry.file_name().to_string_lossy();

        for pattern in &self.ignore_patterns {
            if file_name.contains(pattern) {
                return false;
            }
        }

        // Detect symlink loops
        if entry.file_type().is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !symlink_visited.insert(canonical) {
                    warn!("Symlink loop detected: {}", entry.path().display());
                    return false;
                }
            }
        }

        true
    }
}

fn is_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lower = ext.to_lowercase();
            AUDIO_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}
