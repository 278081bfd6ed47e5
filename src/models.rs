//! Domain records produced by the adapter
//!
//! - **Media**: movies, TV shows and episodes
//! - **Sources**: playable stream locations for a media item
//!
//! These are only ever built by `api::adapter` from upstream JSON; nothing
//! else constructs them from raw backend fields.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Media Models
// =============================================================================

/// Media type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
    Episode,
    #[default]
    Unknown,
}

impl MediaKind {
    /// Wire name used in query strings and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
            MediaKind::Episode => "episode",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "Movie"),
            MediaKind::Tv => write!(f, "TV Show"),
            MediaKind::Episode => write!(f, "Episode"),
            MediaKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Normalized media item (movie, TV show, episode)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Never empty for well-formed upstream data; empty string otherwise
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<String>,
    pub title: String,
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop: Option<String>,
    pub overview: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// 0-10
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Populated when fetching details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year_str = self.year.map(|y| format!(" ({})", y)).unwrap_or_default();
        write!(f, "{}{} [{}]", self.title, year_str, self.kind)?;
        if let Some(rating) = self.rating {
            write!(f, " - ⭐ {:.1}", rating)?;
        }
        Ok(())
    }
}

// =============================================================================
// Source Models
// =============================================================================

/// Stream container/protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Hls,
    Mp4,
    Dash,
    #[default]
    Unknown,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Hls => "hls",
            SourceKind::Mp4 => "mp4",
            SourceKind::Dash => "dash",
            SourceKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playable source for a media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    /// Provider name (e.g. "vidcloud")
    pub provider: String,
    /// Quality label (e.g. "1080p", "auto")
    pub quality: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) {}",
            self.quality, self.provider, self.kind, self.url
        )
    }
}
