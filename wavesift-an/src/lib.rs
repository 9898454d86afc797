//! wavesift-an library interface
//!
//! Batch audio analysis: decodes each file of a collection into the
//! representations the extractors need, runs the signal-processing and neural
//! feature extractors with per-stage failure isolation, and accumulates one
//! partial-result record per file into a collection table.

pub mod aggregate;
pub mod audio;
pub mod backends;
pub mod collection;
pub mod output;
pub mod pipeline;

pub use collection::{CollectionAnalyzer, CollectionTable};
pub use pipeline::{Slot, TrackAnalysisPipeline, TrackRecord};
