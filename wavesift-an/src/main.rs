//! wavesift-an - batch audio collection analyzer
//!
//! Scans a collection root for audio files, runs the per-track analysis
//! pipeline over every file, and writes the predictions and embeddings tables
//! as JSON.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wavesift_an::backends::BackendSet;
use wavesift_an::output;
use wavesift_an::{CollectionAnalyzer, TrackAnalysisPipeline};
use wavesift_common::config::Config;

#[derive(Debug, Parser)]
#[command(name = "wavesift-an", version, about = "Batch audio collection analyzer")]
struct Cli {
    /// Collection root to scan (overrides configuration)
    root: Option<PathBuf>,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base directory for the output tables (embeddings/ and predictions/
    /// subdirectories are created beneath it)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Directory holding the neural model files
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Files analyzed concurrently (0 = one per available core)
    #[arg(long)]
    jobs: Option<usize>,

    /// Per-extractor budget in seconds (0 disables the budget)
    #[arg(long)]
    stage_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting wavesift-an (collection analyzer)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.collection.root = root;
    }
    if let Some(output_dir) = cli.output_dir {
        config.collection.embeddings_dir = output_dir.join("embeddings");
        config.collection.predictions_dir = output_dir.join("predictions");
    }
    if let Some(models_dir) = cli.models_dir {
        config.models.dir = models_dir;
    }
    if let Some(jobs) = cli.jobs {
        config.analysis.jobs = jobs;
    }
    if let Some(stage_timeout) = cli.stage_timeout {
        config.analysis.stage_timeout_secs = stage_timeout;
    }

    info!(root = %config.collection.root.display(), "Collection root");

    let backends = build_backends(&config);
    let pipeline = TrackAnalysisPipeline::from_config(&config, backends);
    let analyzer = CollectionAnalyzer::new(pipeline, config.analysis.effective_jobs());

    let started_at = Utc::now();
    let table = analyzer.analyze(&config.collection.root).await?;
    output::write_tables(&config.collection, &table)?;

    let summary = output::RunSummary::of(&table, started_at);
    info!(
        files = summary.files,
        descriptors_computed = summary.descriptors_computed,
        descriptors_absent = summary.descriptors_absent,
        elapsed_secs = (summary.finished_at - summary.started_at).num_seconds(),
        "Collection analysis complete"
    );

    Ok(())
}

#[cfg(feature = "onnx")]
fn build_backends(config: &Config) -> BackendSet {
    let mut backends = BackendSet::signal_only();
    wavesift_an::backends::onnx::attach_models(&mut backends, &config.models);
    backends
}

#[cfg(not(feature = "onnx"))]
fn build_backends(_config: &Config) -> BackendSet {
    info!("Built without the onnx feature; neural descriptors will be skipped");
    BackendSet::signal_only()
}
