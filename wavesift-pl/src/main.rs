//! wavesift-pl - playlist builder
//!
//! Reads the predictions and embeddings tables written by wavesift-an and
//! builds playlists by descriptor filtering/ranking or by embedding
//! similarity.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wavesift_common::descriptors::{EmbeddingSpace, KeyProfile};
use wavesift_common::tables::{load_embeddings, load_predictions, GenreMetadata};
use wavesift_pl::playlist::write_playlist;
use wavesift_pl::queries::{self, DescriptorFilter, RankBy, Voicing};
use wavesift_pl::similar;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RankArg {
    Tempo,
    Danceability,
    Arousal,
    Valence,
}

impl From<RankArg> for RankBy {
    fn from(arg: RankArg) -> Self {
        match arg {
            RankArg::Tempo => RankBy::Tempo,
            RankArg::Danceability => RankBy::Danceability,
            RankArg::Arousal => RankBy::Arousal,
            RankArg::Valence => RankBy::Valence,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    Temperley,
    Krumhansl,
    Edma,
}

impl From<ProfileArg> for KeyProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Temperley => KeyProfile::Temperley,
            ProfileArg::Krumhansl => KeyProfile::Krumhansl,
            ProfileArg::Edma => KeyProfile::Edma,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SpaceArg {
    Discogs,
    Musicnn,
}

impl From<SpaceArg> for EmbeddingSpace {
    fn from(arg: SpaceArg) -> Self {
        match arg {
            SpaceArg::Discogs => EmbeddingSpace::Discogs,
            SpaceArg::Musicnn => EmbeddingSpace::Musicnn,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "wavesift-pl", version, about = "Playlist builder over analysis tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Filter and rank tracks by descriptor values
    Filter {
        /// Predictions table path
        #[arg(long, default_value = "predictions/audio_predictions.json")]
        predictions: PathBuf,

        #[arg(long)]
        tempo_min: Option<f32>,
        #[arg(long)]
        tempo_max: Option<f32>,
        #[arg(long)]
        loudness_min: Option<f32>,
        #[arg(long)]
        loudness_max: Option<f32>,

        /// Key name to match, e.g. C or F#
        #[arg(long)]
        key: Option<String>,
        /// Scale name to match: major or minor
        #[arg(long)]
        scale: Option<String>,
        /// Key profile the key/scale filter reads
        #[arg(long, value_enum, default_value_t = ProfileArg::Edma)]
        profile: ProfileArg,

        /// Genre whose activation must reach --min-activation
        #[arg(long)]
        genre: Option<String>,
        #[arg(long, default_value_t = 0.1)]
        min_activation: f32,
        /// Genre metadata JSON (required with --genre)
        #[arg(long)]
        genre_metadata: Option<PathBuf>,

        /// Keep only vocal tracks
        #[arg(long, conflicts_with = "instrumental")]
        vocal: bool,
        /// Keep only instrumental tracks
        #[arg(long)]
        instrumental: bool,

        /// Order the playlist by this descriptor, descending
        #[arg(long, value_enum)]
        rank_by: Option<RankArg>,
        /// Keep at most this many tracks
        #[arg(long)]
        limit: Option<usize>,

        /// Playlist file to write
        #[arg(long, default_value = "playlist.txt")]
        output: PathBuf,
    },

    /// Rank tracks by embedding similarity to a query track
    Similar {
        /// Embeddings table path
        #[arg(long, default_value = "embeddings/audio_embeddings.json")]
        embeddings: PathBuf,

        /// Query track path, as keyed in the table
        #[arg(long)]
        track: String,

        /// Embedding space to compare in
        #[arg(long, value_enum, default_value_t = SpaceArg::Discogs)]
        space: SpaceArg,

        /// Number of similar tracks to keep
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Playlist file to write (printed to stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Summarize dominant genres across the collection
    Overview {
        /// Predictions table path
        #[arg(long, default_value = "predictions/audio_predictions.json")]
        predictions: PathBuf,

        /// Genre metadata JSON
        #[arg(long)]
        genre_metadata: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Command::Filter {
            predictions,
            tempo_min,
            tempo_max,
            loudness_min,
            loudness_max,
            key,
            scale,
            profile,
            genre,
            min_activation,
            genre_metadata,
            vocal,
            instrumental,
            rank_by,
            limit,
            output,
        } => {
            let table = load_predictions(&predictions)?;
            let metadata = genre_metadata
                .as_deref()
                .map(GenreMetadata::load)
                .transpose()?;

            let filter = DescriptorFilter {
                tempo_min,
                tempo_max,
                loudness_min,
                loudness_max,
                key,
                scale,
                key_profile: profile.into(),
                genre,
                min_genre_activation: min_activation,
                voicing: if vocal {
                    Some(Voicing::Vocal)
                } else if instrumental {
                    Some(Voicing::Instrumental)
                } else {
                    None
                },
            };

            let mut tracks = queries::filter_tracks(&table, &filter, metadata.as_ref())?;
            if let Some(rank_by) = rank_by {
                tracks = queries::rank_tracks(&table, &tracks, rank_by.into());
            }
            if let Some(limit) = limit {
                tracks.truncate(limit);
            }

            write_playlist(&output, &tracks)?;
            info!(tracks = tracks.len(), playlist = %output.display(), "Wrote playlist");
            println!("{} tracks -> {}", tracks.len(), output.display());
        }

        Command::Similar {
            embeddings,
            track,
            space,
            top,
            output,
        } => {
            let table = load_embeddings(&embeddings)?;
            let ranked = similar::most_similar(&table, &track, space.into(), top)?;

            for (path, score) in &ranked {
                println!("{score:10.4}  {path}");
            }

            if let Some(output) = output {
                let tracks: Vec<String> = ranked.into_iter().map(|(path, _)| path).collect();
                write_playlist(&output, &tracks)?;
                info!(tracks = tracks.len(), playlist = %output.display(), "Wrote playlist");
            }
        }

        Command::Overview {
            predictions,
            genre_metadata,
        } => {
            let table = load_predictions(&predictions)?;
            let metadata = GenreMetadata::load(&genre_metadata)?;

            let labelled = queries::dominant_genres(&table, &metadata);
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for (_, genre) in &labelled {
                *counts.entry(genre.as_str()).or_insert(0) += 1;
            }

            let mut ordered: Vec<(&str, usize)> = counts.into_iter().collect();
            ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

            println!("{} of {} tracks have genre activations", labelled.len(), table.len());
            for (genre, count) in ordered {
                println!("{count:6}  {genre}");
            }
        }
    }

    Ok(())
}
