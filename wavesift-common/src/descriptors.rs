//! Descriptor value types shared between the analyzer and the playlist tools
//!
//! A descriptor is a named, typed feature value computed for one track. The
//! contracted descriptor set is fixed: serialized records never carry keys
//! outside [`DESCRIPTOR_NAMES`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The contracted descriptor names, in serialized record order.
pub const DESCRIPTOR_NAMES: [&str; 7] = [
    "tempo",
    "key",
    "loudness",
    "music_styles",
    "voice_or_instrument",
    "danceability",
    "arousal_and_valence",
];

/// Key extraction profile.
///
/// Each profile is an independent template; one profile failing never blanks
/// the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyProfile {
    Temperley,
    Krumhansl,
    Edma,
}

impl KeyProfile {
    /// All contracted profiles, in serialized order.
    pub const ALL: [KeyProfile; 3] = [
        KeyProfile::Temperley,
        KeyProfile::Krumhansl,
        KeyProfile::Edma,
    ];

    /// Profile name as used in serialized key mappings.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyProfile::Temperley => "temperley",
            KeyProfile::Krumhansl => "krumhansl",
            KeyProfile::Edma => "edma",
        }
    }
}

impl fmt::Display for KeyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperley" => Ok(KeyProfile::Temperley),
            "krumhansl" => Ok(KeyProfile::Krumhansl),
            "edma" => Ok(KeyProfile::Edma),
            other => Err(Error::InvalidInput(format!("unknown key profile: {other}"))),
        }
    }
}

/// Estimated key and scale for one profile.
///
/// Serialized as a two-element array `["C", "major"]` to match the predictions
/// table wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct KeyScale {
    /// Key name, e.g. "C", "F#", "Bb"
    pub key: String,
    /// Scale name, "major" or "minor"
    pub scale: String,
}

impl KeyScale {
    pub fn new(key: impl Into<String>, scale: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            scale: scale.into(),
        }
    }
}

impl From<(String, String)> for KeyScale {
    fn from((key, scale): (String, String)) -> Self {
        Self { key, scale }
    }
}

impl From<KeyScale> for (String, String) {
    fn from(ks: KeyScale) -> Self {
        (ks.key, ks.scale)
    }
}

/// Embedding space an [`Embedding`] or TrackEmbedding belongs to.
///
/// Each space has a fixed per-frame vector length; a model emitting a
/// different length is a shape-contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingSpace {
    Discogs,
    Musicnn,
}

impl EmbeddingSpace {
    /// All contracted embedding spaces.
    pub const ALL: [EmbeddingSpace; 2] = [EmbeddingSpace::Discogs, EmbeddingSpace::Musicnn];

    /// Per-frame vector length contracted for this space.
    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingSpace::Discogs => 512,
            EmbeddingSpace::Musicnn => 256,
        }
    }

    /// Field name used in the embeddings table wire format.
    pub fn table_key(&self) -> &'static str {
        match self {
            EmbeddingSpace::Discogs => "discogs_embeddings",
            EmbeddingSpace::Musicnn => "musiCNN_embeddings",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingSpace::Discogs => "discogs",
            EmbeddingSpace::Musicnn => "musicnn",
        }
    }
}

impl fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingSpace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discogs" => Ok(EmbeddingSpace::Discogs),
            "musicnn" | "musiCNN" => Ok(EmbeddingSpace::Musicnn),
            other => Err(Error::InvalidInput(format!(
                "unknown embedding space: {other}"
            ))),
        }
    }
}
