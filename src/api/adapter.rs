//! PStream adapter
//!
//! Maps arbitrary upstream JSON into [`MediaItem`] and [`Source`] records
//! and exposes the typed entry points the app uses. Supports mock mode for
//! development when the proxy is unreachable.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::client::ApiClient;
use super::error::ClientError;
use super::mock::MockCatalog;
use crate::config::MOCK_INSTANCE_IDENTIFIER;
use crate::models::{MediaItem, MediaKind, Source, SourceKind};
use crate::store::{keys, KeyValueStore};

/// Proxy paths
pub mod paths {
    pub const HOME: &str = "/home";
    pub const SEARCH: &str = "/search";
    pub const CATALOG: &str = "/catalog";
    pub const SOURCES: &str = "/sources";
}

// =============================================================================
// Mapping
// =============================================================================

/// Map a raw upstream object to a [`MediaItem`].
///
/// Each field takes the first candidate key that is present and non-null.
pub fn map_media_item(raw: &Value) -> MediaItem {
    let id = first(raw, &["id", "_id", "tmdbId"])
        .map(coerce_string)
        .unwrap_or_default();
    let tmdb_id = first(raw, &["tmdbId", "tmdb_id", "id"])
        .filter(|v| truthy(v))
        .map(coerce_string);
    let title = first(raw, &["title", "name"])
        .map(coerce_string)
        .unwrap_or_else(|| "Unknown".to_string());
    let poster = first(raw, &["poster", "poster_path", "image"])
        .filter(|v| truthy(v))
        .map(coerce_string);
    let backdrop = first(raw, &["backdrop", "backdrop_path"])
        .filter(|v| truthy(v))
        .map(coerce_string);
    let overview = first(raw, &["overview", "description", "plot"])
        .map(coerce_string)
        .unwrap_or_default();

    let sources = raw
        .get("sources")
        .and_then(Value::as_array)
        .map(|sources| sources.iter().map(map_source).collect());

    if !raw.get("id").is_some_and(truthy) && !raw.get("tmdbId").is_some_and(truthy) {
        warn!("Item missing ID field (title: {})", title);
    }

    MediaItem {
        id,
        tmdb_id,
        title,
        poster,
        backdrop,
        overview,
        kind: media_kind(raw),
        year: release_year(raw),
        rating: first_number(raw, &["rating", "vote_average"]),
        sources,
        season: raw.get("season").and_then(as_u32),
        episode: raw.get("episode").and_then(as_u32),
        genres: raw.get("genres").and_then(Value::as_array).map(|genres| {
            genres.iter().map(genre_name).collect()
        }),
    }
}

/// Map a raw upstream object to a [`Source`]
pub fn map_source(raw: &Value) -> Source {
    let url = first(raw, &["url", "file", "src"])
        .map(coerce_string)
        .unwrap_or_default();
    let provider = first(raw, &["provider", "source"])
        .map(coerce_string)
        .unwrap_or_else(|| "unknown".to_string());
    let quality = first(raw, &["quality", "label"])
        .map(coerce_string)
        .unwrap_or_else(|| "auto".to_string());
    let explicit = raw
        .get("type")
        .filter(|v| !v.is_null())
        .map(coerce_string)
        .unwrap_or_default();

    let kind = classify_source(&explicit, &url);

    Source {
        url,
        provider,
        quality,
        kind,
    }
}

/// Two-stage classifier: the explicit type wins, then the URL extension
pub fn classify_source(explicit_type: &str, url: &str) -> SourceKind {
    const BY_TYPE: [(&str, SourceKind); 3] = [
        ("hls", SourceKind::Hls),
        ("mp4", SourceKind::Mp4),
        ("dash", SourceKind::Dash),
    ];
    const BY_EXTENSION: [(&str, SourceKind); 3] = [
        (".m3u8", SourceKind::Hls),
        (".mp4", SourceKind::Mp4),
        (".mpd", SourceKind::Dash),
    ];

    let explicit_type = explicit_type.to_ascii_lowercase();
    if let Some((_, kind)) = BY_TYPE.iter().find(|(t, _)| explicit_type.contains(t)) {
        return *kind;
    }

    let url = url.to_ascii_lowercase();
    BY_EXTENSION
        .iter()
        .find(|(ext, _)| url.contains(ext))
        .map(|(_, kind)| *kind)
        .unwrap_or(SourceKind::Unknown)
}

fn media_kind(raw: &Value) -> MediaKind {
    let explicit = raw.get("type").and_then(Value::as_str);
    let media_type = raw.get("media_type").and_then(Value::as_str);
    let is = |name: &str| explicit == Some(name) || media_type == Some(name);

    if is("movie") {
        MediaKind::Movie
    } else if is("tv") || raw.get("seasons").is_some_and(truthy) {
        MediaKind::Tv
    } else if explicit == Some("episode") || raw.get("episode_number").is_some_and(truthy) {
        MediaKind::Episode
    } else {
        MediaKind::Unknown
    }
}

fn release_year(raw: &Value) -> Option<i32> {
    match first(raw, &["release_date", "first_air_date", "year"])? {
        Value::String(date) => extract_year(date),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(|y| i32::try_from(y).ok()),
        _ => None,
    }
}

/// Extract year from a date string like "2022-03-04"
fn extract_year(date: &str) -> Option<i32> {
    let prefix = date.get(..4)?;
    if prefix.chars().all(|c| c.is_ascii_digit()) {
        prefix.parse().ok()
    } else {
        None
    }
}

fn genre_name(genre: &Value) -> String {
    match genre {
        Value::String(s) => s.clone(),
        other => other
            .get("name")
            .filter(|v| !v.is_null())
            .map(coerce_string)
            .unwrap_or_else(|| coerce_string(other)),
    }
}

/// First candidate key that is present and not null
fn first<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|v| !v.is_null())
}

fn first_number(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find_map(Value::as_f64)
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Elements of a bare array or of an `{<envelope>: [...]}` object
fn extract_array<'a>(value: &'a Value, envelope: &str) -> Option<&'a Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get(envelope).and_then(Value::as_array),
        _ => None,
    }
}

// =============================================================================
// Mock Fallback
// =============================================================================

/// When to serve mock data instead of (or after) a real fetch
#[derive(Debug, Clone, Copy, Default)]
pub struct MockPolicy {
    /// Skip the network entirely
    pub use_mock: bool,
    /// Serve mock data if the fetch fails with a network-class error
    pub fallback_on_network_error: bool,
}

/// Run `fetch`, substituting `mock` per `policy`
pub async fn with_mock_fallback<T, F, Fut, M, MFut>(
    label: &str,
    fetch: F,
    mock: M,
    policy: MockPolicy,
) -> Result<T, ClientError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
    M: FnOnce() -> MFut,
    MFut: Future<Output = T>,
{
    if policy.use_mock {
        debug!("Using mock data for {}", label);
        return Ok(mock().await);
    }

    match fetch().await {
        Ok(value) => Ok(value),
        Err(e) if policy.fallback_on_network_error && e.is_network_error() => {
            warn!("{} failed ({}), falling back to mock data", label, e);
            Ok(mock().await)
        }
        Err(e) => Err(e),
    }
}

// =============================================================================
// Entry Points
// =============================================================================

/// Typed access to the proxy's metadata routes
pub struct PStreamApi {
    client: Arc<ApiClient>,
    store: Arc<dyn KeyValueStore>,
    mock: MockCatalog,
}

impl PStreamApi {
    pub fn new(client: Arc<ApiClient>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_mock_catalog(client, store, MockCatalog::default())
    }

    pub fn with_mock_catalog(
        client: Arc<ApiClient>,
        store: Arc<dyn KeyValueStore>,
        mock: MockCatalog,
    ) -> Self {
        Self {
            client,
            store,
            mock,
        }
    }

    /// Mock mode is on when the stored flag is `"true"` or the active
    /// endpoint is the mock sentinel
    pub fn is_mock_mode(&self) -> bool {
        let flag = match self.store.get(keys::MOCK_MODE) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not read mock mode flag: {}", e);
                None
            }
        };

        flag.as_deref() == Some("true") || self.client.resolve_endpoint() == MOCK_INSTANCE_IDENTIFIER
    }

    pub fn set_mock_mode(&self, enabled: bool) -> anyhow::Result<()> {
        self.store
            .set(keys::MOCK_MODE, if enabled { "true" } else { "false" })?;
        info!("Mock mode {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    fn policy(&self) -> MockPolicy {
        MockPolicy {
            use_mock: self.is_mock_mode(),
            fallback_on_network_error: self.client.config().mock_fallback,
        }
    }

    /// Home feed
    pub async fn fetch_home(&self) -> Result<Vec<MediaItem>, ClientError> {
        with_mock_fallback(
            "home",
            || async {
                let response = self.client.get(paths::HOME, &[]).await?;
                Ok::<_, ClientError>(media_items(&response, "home"))
            },
            || self.mock.home(),
            self.policy(),
        )
        .await
    }

    /// Search; blank queries return nothing without touching the network
    pub async fn search(&self, query: &str) -> Result<Vec<MediaItem>, ClientError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        with_mock_fallback(
            "search",
            || async {
                let response = self.client.get(paths::SEARCH, &[("q", query)]).await?;
                Ok::<_, ClientError>(media_items(&response, "search"))
            },
            || self.mock.search(query),
            self.policy(),
        )
        .await
    }

    /// Item details. `None` when the response is not an object.
    pub async fn fetch_details(&self, id: &str) -> Result<Option<MediaItem>, ClientError> {
        with_mock_fallback(
            "details",
            || async {
                let path = format!("{}/{}", paths::CATALOG, urlencoding::encode(id));
                let response = self.client.get(&path, &[]).await?;
                Ok::<_, ClientError>(media_item(&response))
            },
            || async { Some(self.mock.details(id).await) },
            self.policy(),
        )
        .await
    }

    /// Playable sources for a title
    pub async fn fetch_sources(
        &self,
        tmdb_id: &str,
        kind: MediaKind,
    ) -> Result<Vec<Source>, ClientError> {
        with_mock_fallback(
            "sources",
            || async {
                let params = [("tmdbId", tmdb_id), ("type", kind.as_str())];
                let response = self.client.get(paths::SOURCES, &params).await?;
                Ok::<_, ClientError>(sources(&response))
            },
            || self.mock.sources(tmdb_id),
            self.policy(),
        )
        .await
    }
}

/// Map a home/search response; unrecognized shapes yield an empty list
pub(crate) fn media_items(response: &Value, label: &str) -> Vec<MediaItem> {
    match extract_array(response, "items") {
        Some(items) => items.iter().map(map_media_item).collect(),
        None => {
            debug!("Unexpected {} response format, returning empty list", label);
            Vec::new()
        }
    }
}

/// Map a sources response; unrecognized shapes yield an empty list
pub(crate) fn sources(response: &Value) -> Vec<Source> {
    match extract_array(response, "sources") {
        Some(sources) => sources.iter().map(map_source).collect(),
        None => {
            debug!("Unexpected sources response format, returning empty list");
            Vec::new()
        }
    }
}

/// Map a details response, unwrapping an `{item: {...}}` envelope
fn media_item(response: &Value) -> Option<MediaItem> {
    let Value::Object(map) = response else {
        debug!("Unexpected details response format");
        return None;
    };

    let is_envelope = map.get("item").is_some_and(Value::is_object)
        && !map.contains_key("id")
        && !map.contains_key("title");
    match map.get("item") {
        Some(inner) if is_envelope => Some(map_media_item(inner)),
        _ => Some(map_media_item(response)),
    }
}
