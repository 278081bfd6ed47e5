//! Backend forwarding
//!
//! The one controlled gateway from the proxy to the internal backend.
//! Only routes that call [`BackendForwarder::forward_to_backend`] reach the backend;
//! there is no catch-all forwarding.

use anyhow::{Context, Result};
use axum::http::header::{HeaderMap, HeaderName, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use super::error::ProxyError;
use crate::config::{ProxyConfig, CLIENT_HEADER};

/// Headers meaningful for a single hop only
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Successful backend response, passed through unchanged
#[derive(Debug)]
pub struct Forwarded {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for Forwarded {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Forwards GET requests to the configured internal backend
pub struct BackendForwarder {
    backend_url: Url,
    http: reqwest::Client,
}

impl BackendForwarder {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let backend_url = Url::parse(&config.backend_internal_url)
            .context("Invalid backend URL")?;

        let http = reqwest::Client::builder()
            .timeout(config.backend_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self { backend_url, http })
    }

    /// Backend URL for `backend_path`, with the incoming query copied over
    /// verbatim. Scheme, host and port always come from configuration.
    ///
    /// Fails if URL normalization (dot segments) would move the request
    /// off `backend_path`.
    pub fn backend_url(
        &self,
        backend_path: &str,
        raw_query: Option<&str>,
    ) -> Result<Url, ProxyError> {
        let mut url = self.backend_url.clone();
        url.set_path(backend_path);
        url.set_query(raw_query.filter(|q| !q.is_empty()));

        if url.path() != backend_path {
            warn!("Rejected backend path for route {}", backend_path);
            return Err(ProxyError::PathRejected);
        }

        Ok(url)
    }

    /// GET `backend_path` on the backend on behalf of an incoming request
    pub async fn forward_to_backend(
        &self,
        headers: &HeaderMap,
        raw_query: Option<&str>,
        backend_path: &str,
    ) -> Result<Forwarded, ProxyError> {
        let url = self.backend_url(backend_path, raw_query)?;
        debug!("Forwarding: GET {}", backend_path);

        let response = self
            .http
            .get(url)
            .headers(forward_headers(headers))
            .send()
            .await
            .map_err(|_| {
                error!("Backend unreachable");
                ProxyError::BadGateway
            })?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.bytes().await.map_err(|_| {
            error!("Backend response interrupted");
            ProxyError::BadGateway
        })?;

        if !status.is_success() {
            return Err(ProxyError::Backend {
                status,
                body: error_body(&body),
            });
        }

        Ok(Forwarded {
            status,
            content_type,
            body,
        })
    }
}

/// Allow-listed incoming headers, minus anything hop-by-hop
pub fn forward_headers(incoming: &HeaderMap) -> HeaderMap {
    let allowed = [
        ACCEPT,
        ACCEPT_LANGUAGE,
        CONTENT_TYPE,
        HeaderName::from_static(CLIENT_HEADER),
    ];

    let mut forwarded = HeaderMap::new();
    for name in allowed {
        if let Some(value) = incoming.get(&name) {
            forwarded.insert(name, value.clone());
        }
    }

    filter_hop_by_hop(forwarded)
}

/// Drop hop-by-hop headers
pub fn filter_hop_by_hop(headers: HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers.iter() {
        if !HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

fn error_body(body: &Bytes) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, CONNECTION, COOKIE, HOST};

    fn forwarder() -> BackendForwarder {
        BackendForwarder::new(&ProxyConfig::default()).unwrap()
    }

    #[test]
    fn test_filter_drops_connection() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(HOST, HeaderValue::from_static("proxy.example"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let filtered = filter_hop_by_hop(headers);
        assert!(filtered.get(CONNECTION).is_none());
        assert!(filtered.get(HOST).is_none());
        assert_eq!(filtered.get(ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_forward_headers_allow_list() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CLIENT_HEADER, HeaderValue::from_static("pstream-app"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        headers.insert(COOKIE, HeaderValue::from_static("session=1"));
        headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));

        let forwarded = forward_headers(&headers);
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded.get(CLIENT_HEADER).unwrap(), "pstream-app");
        assert!(forwarded.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_backend_url_replaces_path_and_copies_query() {
        let url = forwarder()
            .backend_url("/sources", Some("tmdbId=603&type=movie"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:3000/sources?tmdbId=603&type=movie"
        );

        let url = forwarder().backend_url("/home", None).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/home");
    }

    #[test]
    fn test_backend_url_query_bytes_unchanged() {
        let url = forwarder()
            .backend_url("/search", Some("q=a%20b&flag"))
            .unwrap();
        assert_eq!(url.query(), Some("q=a%20b&flag"));
    }

    #[test]
    fn test_backend_url_rejects_dot_segments() {
        for path in ["/catalog/..", "/catalog/.", "/catalog/../admin"] {
            assert!(
                matches!(
                    forwarder().backend_url(path, None),
                    Err(ProxyError::PathRejected)
                ),
                "{path}"
            );
        }
    }

    #[test]
    fn test_error_body_shapes() {
        assert_eq!(error_body(&Bytes::new()), None);
        assert_eq!(
            error_body(&Bytes::from_static(b"{\"message\":\"nope\"}")),
            Some(serde_json::json!({"message": "nope"}))
        );
        assert_eq!(
            error_body(&Bytes::from_static(b"plain")),
            Some(Value::String("plain".to_string()))
        );
    }
}
