//! Mock data provider for local development
//!
//! Used when mock mode is enabled or the proxy is unreachable. Fixtures are
//! embedded at build time and run through the same mapping as live data.

use serde_json::Value;
use std::time::Duration;

use super::adapter::{media_items, sources};
use crate::models::{MediaItem, MediaKind, Source};

const HOME_FIXTURE: &str = include_str!("fixtures/home.json");
const SEARCH_FIXTURE: &str = include_str!("fixtures/search.json");
const SOURCES_FIXTURE: &str = include_str!("fixtures/sources.json");

/// Simulated network delay for realistic testing
pub const DEFAULT_MOCK_DELAY: Duration = Duration::from_millis(500);

/// Fixture-backed catalog
#[derive(Debug, Clone)]
pub struct MockCatalog {
    delay: Duration,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_MOCK_DELAY)
    }
}

impl MockCatalog {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// No simulated delay
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    async fn simulate_delay(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    pub async fn home(&self) -> Vec<MediaItem> {
        self.simulate_delay().await;
        fixture_items(HOME_FIXTURE)
    }

    /// Items whose title or overview contains `query` (case-insensitive)
    pub async fn search(&self, query: &str) -> Vec<MediaItem> {
        self.simulate_delay().await;

        let needle = query.to_lowercase();
        fixture_items(SEARCH_FIXTURE)
            .into_iter()
            .filter(|item| {
                item.title.to_lowercase().contains(&needle)
                    || item.overview.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Item by `id` or `tmdbId` with fixture sources attached; a generic
    /// placeholder for unknown ids
    pub async fn details(&self, id: &str) -> MediaItem {
        self.simulate_delay().await;

        let sources = fixture_sources();
        let found = fixture_items(HOME_FIXTURE)
            .into_iter()
            .chain(fixture_items(SEARCH_FIXTURE))
            .find(|item| item.id == id || item.tmdb_id.as_deref() == Some(id));

        match found {
            Some(item) => MediaItem {
                sources: Some(sources),
                ..item
            },
            None => MediaItem {
                id: id.to_string(),
                tmdb_id: None,
                title: format!("Mock Item {}", id),
                poster: None,
                backdrop: None,
                overview: "This is a mock media item for development testing.".to_string(),
                kind: MediaKind::Movie,
                year: Some(2024),
                rating: Some(7.5),
                sources: Some(sources),
                season: None,
                episode: None,
                genres: None,
            },
        }
    }

    pub async fn sources(&self, tmdb_id: &str) -> Vec<Source> {
        self.simulate_delay().await;
        tracing::debug!("Serving mock sources for TMDB ID {}", tmdb_id);
        fixture_sources()
    }
}

fn parse_fixture(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!("Invalid mock fixture: {}", e);
        Value::Null
    })
}

fn fixture_items(raw: &str) -> Vec<MediaItem> {
    media_items(&parse_fixture(raw), "mock")
}

fn fixture_sources() -> Vec<Source> {
    sources(&parse_fixture(SOURCES_FIXTURE))
}
