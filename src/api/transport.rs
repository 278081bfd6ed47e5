//! HTTP transport boundary
//!
//! The transport turns raw I/O outcomes into a closed set of variants
//! before any normalization logic runs. It never follows redirects.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// One attempt of a logical request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Active base endpoint for this attempt
    pub base_url: String,
    /// Path relative to `base_url` (e.g. "/home")
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// 0 for the first attempt, incremented per retry
    pub attempt: u32,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            base_url: String::new(),
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            attempt: 0,
        }
    }

    /// `base_url` joined with `path`, without the query string
    pub fn full_url(&self) -> String {
        if self.path.starts_with("http://") || self.path.starts_with("https://") {
            return self.path.clone();
        }
        let base = self.base_url.trim_end_matches('/');
        if self.path.is_empty() {
            base.to_string()
        } else if self.path.starts_with('/') {
            format!("{}{}", base, self.path)
        } else {
            format!("{}/{}", base, self.path)
        }
    }

    /// Set a header, ignoring values that are not valid header text
    pub fn set_header(&mut self, name: &'static str, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(HeaderName::from_static(name), value);
        }
    }
}

/// A received response, whatever its status
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed JSON body; non-JSON text is kept as a JSON string
    pub body: Value,
}

impl TransportResponse {
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

/// Closed set of transport-level failures
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportFailure {
    /// Nothing came back (connection refused, DNS, reset)
    NoResponse { message: String },
    /// The server answered with an error or redirect status
    HttpStatus {
        status: u16,
        body: Option<Value>,
        location: Option<String>,
    },
    /// Request aborted by the timeout
    Aborted { message: String },
}

impl TransportFailure {
    pub fn message(&self) -> Option<&str> {
        match self {
            TransportFailure::NoResponse { message } | TransportFailure::Aborted { message } => {
                Some(message)
            }
            TransportFailure::HttpStatus { .. } => None,
        }
    }

    /// Transient failures: no response, timeout, 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            TransportFailure::NoResponse { .. } | TransportFailure::Aborted { .. } => true,
            TransportFailure::HttpStatus { status, .. } => *status >= 500,
        }
    }

    pub fn from_response(response: &TransportResponse) -> Self {
        let body = match &response.body {
            Value::Null => None,
            other => Some(other.clone()),
        };
        TransportFailure::HttpStatus {
            status: response.status,
            body,
            location: response.location(),
        }
    }
}

/// Executes a single request attempt
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &RequestContext) -> Result<TransportResponse, TransportFailure>;
}

/// reqwest-backed transport with redirects disabled
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &RequestContext) -> Result<TransportResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.full_url())
            .headers(request.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(classify_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body: parse_body(&text),
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Aborted {
            message: format!("timeout exceeded: {}", err),
        }
    } else {
        TransportFailure::NoResponse {
            message: format!("Network Error: {}", err),
        }
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
