//! Domain adapter tests
//!
//! Tests field mapping, response envelopes, mock mode and network fallback.

use futures::future::join_all;
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use pstream::api::{classify_source, map_media_item, map_source, ApiClient, MockCatalog, PStreamApi};
use pstream::config::ClientConfig;
use pstream::models::{MediaKind, SourceKind};
use pstream::store::{keys, KeyValueStore, MemoryStore};

fn api_with(config: ClientConfig) -> (PStreamApi, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(ApiClient::new(config).unwrap());
    let api = PStreamApi::with_mock_catalog(client, store.clone(), MockCatalog::instant());
    (api, store)
}

fn api_for(base_url: &str) -> (PStreamApi, Arc<MemoryStore>) {
    api_with(ClientConfig {
        retry_delay: Duration::from_millis(10),
        ..ClientConfig::with_base_url(base_url)
    })
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

// =============================================================================
// Media Item Mapping
// =============================================================================

#[test]
fn test_tv_from_media_type_and_seasons() {
    let item = map_media_item(&json!({
        "title": "X",
        "media_type": "tv",
        "seasons": [{"season_number": 1}]
    }));
    assert_eq!(item.kind, MediaKind::Tv);

    // Seasons alone imply TV
    let item = map_media_item(&json!({"id": 1, "seasons": []}));
    assert_eq!(item.kind, MediaKind::Tv);
}

#[test]
fn test_kind_fallbacks() {
    assert_eq!(
        map_media_item(&json!({"type": "movie"})).kind,
        MediaKind::Movie
    );
    assert_eq!(
        map_media_item(&json!({"episode_number": 3})).kind,
        MediaKind::Episode
    );
    assert_eq!(
        map_media_item(&json!({"type": "episode"})).kind,
        MediaKind::Episode
    );
    assert_eq!(
        map_media_item(&json!({"type": "documentary"})).kind,
        MediaKind::Unknown
    );
}

#[test]
fn test_year_from_dates() {
    assert_eq!(
        map_media_item(&json!({"release_date": "2019-05-01"})).year,
        Some(2019)
    );
    assert_eq!(
        map_media_item(&json!({"first_air_date": "2008-01-20"})).year,
        Some(2008)
    );
    assert_eq!(map_media_item(&json!({"year": 2001})).year, Some(2001));
    assert_eq!(map_media_item(&json!({"release_date": "TBA"})).year, None);
    assert_eq!(map_media_item(&json!({})).year, None);
}

#[test]
fn test_id_fallbacks() {
    let item = map_media_item(&json!({"_id": "abc", "title": "Mongo"}));
    assert_eq!(item.id, "abc");
    assert_eq!(item.tmdb_id, None);

    let item = map_media_item(&json!({"tmdbId": 42}));
    assert_eq!(item.id, "42");
    assert_eq!(item.tmdb_id.as_deref(), Some("42"));

    let item = map_media_item(&json!({"id": 603, "tmdb_id": 603}));
    assert_eq!(item.id, "603");
    assert_eq!(item.tmdb_id.as_deref(), Some("603"));

    // Nothing to go on: empty id, never a panic
    let item = map_media_item(&json!({}));
    assert_eq!(item.id, "");
    assert_eq!(item.title, "Unknown");
    assert_eq!(item.overview, "");
}

#[test]
fn test_text_and_image_fallbacks() {
    let item = map_media_item(&json!({
        "id": 1,
        "name": "Breaking Bad",
        "poster_path": "/poster.jpg",
        "backdrop_path": "/backdrop.jpg",
        "description": "Chemistry"
    }));
    assert_eq!(item.title, "Breaking Bad");
    assert_eq!(item.poster.as_deref(), Some("/poster.jpg"));
    assert_eq!(item.backdrop.as_deref(), Some("/backdrop.jpg"));
    assert_eq!(item.overview, "Chemistry");

    let item = map_media_item(&json!({"id": 1, "poster": "", "plot": "Plot"}));
    assert_eq!(item.poster, None);
    assert_eq!(item.overview, "Plot");
}

#[test]
fn test_rating_and_episode_numbers() {
    let item = map_media_item(&json!({"vote_average": 8.4, "season": 2, "episode": 5}));
    assert_eq!(item.rating, Some(8.4));
    assert_eq!(item.season, Some(2));
    assert_eq!(item.episode, Some(5));

    let item = map_media_item(&json!({"rating": "high", "vote_average": 7}));
    assert_eq!(item.rating, Some(7.0));
}

#[test]
fn test_genres_coerced() {
    let item = map_media_item(&json!({
        "genres": [{"id": 18, "name": "Drama"}, "Action", 7]
    }));
    assert_eq!(
        item.genres,
        Some(vec!["Drama".to_string(), "Action".to_string(), "7".to_string()])
    );
}

#[test]
fn test_nested_sources_mapped() {
    let item = map_media_item(&json!({
        "id": "603",
        "sources": [{"file": "https://cdn.example.com/master.m3u8"}]
    }));
    let sources = item.sources.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].kind, SourceKind::Hls);
}

// =============================================================================
// Source Mapping
// =============================================================================

#[test]
fn test_source_classification() {
    assert_eq!(
        classify_source("", "https://cdn.example.com/stream.m3u8"),
        SourceKind::Hls
    );
    assert_eq!(
        classify_source("dash", "https://cdn.example.com/video.mp4"),
        SourceKind::Dash
    );
    assert_eq!(
        classify_source("video/MP4", "https://cdn.example.com/x"),
        SourceKind::Mp4
    );
    assert_eq!(
        classify_source("", "https://cdn.example.com/manifest.mpd"),
        SourceKind::Dash
    );
    assert_eq!(
        classify_source("", "https://cdn.example.com/embed"),
        SourceKind::Unknown
    );
}

#[test]
fn test_source_field_fallbacks() {
    let source = map_source(&json!({
        "src": "https://cdn.example.com/a.mp4",
        "source": "vidcloud",
        "label": "1080p"
    }));
    assert_eq!(source.url, "https://cdn.example.com/a.mp4");
    assert_eq!(source.provider, "vidcloud");
    assert_eq!(source.quality, "1080p");
    assert_eq!(source.kind, SourceKind::Mp4);

    let source = map_source(&json!({}));
    assert_eq!(source.url, "");
    assert_eq!(source.provider, "unknown");
    assert_eq!(source.quality, "auto");
    assert_eq!(source.kind, SourceKind::Unknown);
}

// =============================================================================
// Entry Points
// =============================================================================

#[tokio::test]
async fn test_fetch_home_bare_array() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/home")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 1, "title": "One"}, {"id": 2, "title": "Two"}]"#)
        .create_async()
        .await;

    let (api, _) = api_for(&server.url());
    let items = api.fetch_home().await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[1].id, "2");
}

#[tokio::test]
async fn test_fetch_home_items_envelope() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/home")
        .with_status(200)
        .with_body(r#"{"items": [{"id": "603", "title": "The Matrix", "type": "movie"}]}"#)
        .create_async()
        .await;

    let (api, _) = api_for(&server.url());
    let items = api.fetch_home().await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "The Matrix");
    assert_eq!(items[0].kind, MediaKind::Movie);
}

#[tokio::test]
async fn test_unrecognized_shape_is_empty() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/home")
        .with_status(200)
        .with_body(r#"{"results": [{"id": 1}]}"#)
        .create_async()
        .await;

    let (api, _) = api_for(&server.url());
    assert!(api.fetch_home().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_search_skips_network() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (api, _) = api_for(&server.url());
    assert!(api.search("").await.unwrap().is_empty());
    assert!(api.search("   ").await.unwrap().is_empty());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_search_sends_query() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("q".into(), "the batman".into()))
        .with_status(200)
        .with_body(r#"{"items": [{"id": 414906, "title": "The Batman"}]}"#)
        .create_async()
        .await;

    let (api, _) = api_for(&server.url());
    let results = api.search("the batman").await.unwrap();

    mock.assert_async().await;
    assert_eq!(results[0].id, "414906");
}

#[tokio::test]
async fn test_fetch_details_unwraps_item() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/catalog/603")
        .with_status(200)
        .with_body(r#"{"item": {"id": "603", "title": "The Matrix", "release_date": "1999-03-30"}}"#)
        .create_async()
        .await;

    let (api, _) = api_for(&server.url());
    let item = api.fetch_details("603").await.unwrap().unwrap();

    assert_eq!(item.title, "The Matrix");
    assert_eq!(item.year, Some(1999));
}

#[tokio::test]
async fn test_fetch_details_non_object_is_none() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/catalog/603")
        .with_status(200)
        .with_body(r#"[1, 2, 3]"#)
        .create_async()
        .await;

    let (api, _) = api_for(&server.url());
    assert!(api.fetch_details("603").await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_sources_query_and_envelope() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/sources")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("tmdbId".into(), "1396".into()),
            Matcher::UrlEncoded("type".into(), "tv".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"sources": [
                {"url": "https://cdn.example.com/ep.m3u8", "provider": "vidcloud", "quality": "1080p"},
                {"url": "https://cdn.example.com/ep.mpd", "type": "dash"}
            ]}"#,
        )
        .create_async()
        .await;

    let (api, _) = api_for(&server.url());
    let sources = api.fetch_sources("1396", MediaKind::Tv).await.unwrap();

    mock.assert_async().await;
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].kind, SourceKind::Hls);
    assert_eq!(sources[0].provider, "vidcloud");
    assert_eq!(sources[1].kind, SourceKind::Dash);
}

#[tokio::test]
async fn test_client_errors_propagate() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/catalog/missing")
        .with_status(404)
        .with_body(r#"{"message": "Not found"}"#)
        .create_async()
        .await;

    let (api, _) = api_for(&server.url());
    let err = api.fetch_details("missing").await.unwrap_err();
    assert_eq!(err.as_api().unwrap().code, 404);
}

// =============================================================================
// Mock Mode
// =============================================================================

#[tokio::test]
async fn test_mock_mode_skips_network() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/home")
        .expect(0)
        .create_async()
        .await;

    let (api, store) = api_for(&server.url());
    assert!(!api.is_mock_mode());

    api.set_mock_mode(true).unwrap();
    assert_eq!(store.get(keys::MOCK_MODE).unwrap().as_deref(), Some("true"));
    assert!(api.is_mock_mode());

    let items = api.fetch_home().await.unwrap();
    assert!(!items.is_empty());
    mock.assert_async().await;

    api.set_mock_mode(false).unwrap();
    assert!(!api.is_mock_mode());
}

#[tokio::test]
async fn test_mock_sentinel_endpoint_enables_mock_mode() {
    let (api, _) = api_for("__MOCK__");
    assert!(api.is_mock_mode());

    let sources = api.fetch_sources("603", MediaKind::Movie).await.unwrap();
    assert_eq!(sources.len(), 2);
}

#[tokio::test]
async fn test_network_failure_falls_back_to_mock() {
    let (api, _) = api_for(&closed_port_url());

    let items = api.fetch_home().await.unwrap();
    assert_eq!(items.len(), 4);

    let item = api.fetch_details("603").await.unwrap().unwrap();
    assert_eq!(item.title, "The Matrix");
}

#[tokio::test]
async fn test_network_failure_without_fallback_errors() {
    let (api, _) = api_with(ClientConfig {
        retry_delay: Duration::from_millis(10),
        mock_fallback: false,
        ..ClientConfig::with_base_url(closed_port_url())
    });

    let err = api.fetch_home().await.unwrap_err();
    assert!(err.is_network_error());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_details() {
    let mut server = Server::new_async().await;

    for id in ["1", "2", "3"] {
        server
            .mock("GET", format!("/catalog/{}", id).as_str())
            .with_status(200)
            .with_body(format!(r#"{{"id": "{id}", "title": "Item {id}"}}"#))
            .create_async()
            .await;
    }

    let (api, _) = api_for(&server.url());
    let results = join_all(["1", "2", "3"].iter().map(|id| api.fetch_details(id))).await;

    let titles: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap().title)
        .collect();
    assert_eq!(titles, vec!["Item 1", "Item 2", "Item 3"]);
}
