//! Explicit proxy routes
//!
//! Each metadata route forwards to the backend path of the same name. Any
//! other path is answered by the proxy itself.

use axum::extract::{Path, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::error::ProxyError;
use super::forward::BackendForwarder;

/// Shared router state
#[derive(Clone)]
pub struct ProxyState {
    pub forwarder: Arc<BackendForwarder>,
}

impl ProxyState {
    pub fn new(forwarder: BackendForwarder) -> Self {
        Self {
            forwarder: Arc::new(forwarder),
        }
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/home", get(home))
        .route("/search", get(search))
        .route("/catalog/:id", get(catalog))
        .route("/sources", get(sources))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn home(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    forward(&state, &headers, query, "/home").await
}

/// `GET /search?q=<query>`
async fn search(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    forward(&state, &headers, query, "/search").await
}

/// `GET /catalog/:id`
async fn catalog(
    State(state): State<ProxyState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    if id.trim().is_empty() {
        return Err(ProxyError::MissingParameter("id"));
    }
    if id == "." || id == ".." {
        return Err(ProxyError::InvalidParameter("id"));
    }

    let path = format!("/catalog/{}", urlencoding::encode(&id));
    forward(&state, &headers, query, &path).await
}

/// `GET /sources?tmdbId=<id>&type=<movie|tv>`
async fn sources(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    forward(&state, &headers, query, "/sources").await
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn forward(
    state: &ProxyState,
    headers: &HeaderMap,
    query: Option<String>,
    backend_path: &str,
) -> Result<Response, ProxyError> {
    state
        .forwarder
        .forward_to_backend(headers, query.as_deref(), backend_path)
        .await
        .map(IntoResponse::into_response)
}
