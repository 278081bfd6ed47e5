//! Configuration for the API client and the edge proxy
//!
//! The client talks to the proxy ONLY. The proxy is the only process that
//! knows where the internal backend lives.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Proxy endpoint every client request is resolved against.
/// 10.0.2.2 maps to the host machine from the Android emulator.
pub const BASE_API_URL: &str = "http://10.0.2.2:3003";

/// Port of the internal backend. Client traffic to it is rejected.
pub const FORBIDDEN_BACKEND_PORT: u16 = 3000;

/// Request timeout for proxy calls
pub const API_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for ad hoc instance validation calls
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry budget for transient failures
pub const API_RETRY_COUNT: u32 = 1;

/// Linear backoff step between retries
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Value of the client identifier header
pub const CLIENT_IDENTIFIER: &str = "pstream-app";

/// Client identifier header name
pub const CLIENT_HEADER: &str = "x-pstream-client";

/// Request timestamp header name
pub const TIMESTAMP_HEADER: &str = "x-request-timestamp";

/// Endpoint value that switches the adapter to mock data
pub const MOCK_INSTANCE_IDENTIFIER: &str = "__MOCK__";

/// Internal backend address used when nothing is configured
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3000";

/// Port the edge proxy listens on by default
pub const DEFAULT_PROXY_PORT: u16 = 3003;

/// Settings for the secure API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Active base endpoint (the proxy)
    pub base_url: String,
    /// Destination port that must never be contacted
    pub forbidden_port: u16,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Backoff is `retry_delay * attempt`
    pub retry_delay: Duration,
    pub client_identifier: String,
    /// Attach `X-Request-Timestamp` to every attempt
    pub send_timestamp: bool,
    /// Serve mock data when the proxy is unreachable
    pub mock_fallback: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_API_URL.to_string(),
            forbidden_port: FORBIDDEN_BACKEND_PORT,
            timeout: API_TIMEOUT,
            max_retries: API_RETRY_COUNT,
            retry_delay: RETRY_DELAY,
            client_identifier: CLIENT_IDENTIFIER.to_string(),
            send_timestamp: true,
            mock_fallback: true,
        }
    }
}

impl ClientConfig {
    /// Create a config pointing at a custom endpoint (for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults with deployment overrides from the environment:
    /// `PSTREAM_API_URL`, `PSTREAM_API_TIMEOUT_MS`, `PSTREAM_API_RETRIES`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("PSTREAM_API_URL") {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                config.base_url = url.to_string();
            }
        }
        if let Some(ms) = env_parse::<u64>("PSTREAM_API_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = env_parse::<u32>("PSTREAM_API_RETRIES") {
            config.max_retries = retries;
        }

        config
    }
}

/// Settings for the edge proxy process
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Internal backend base URL. Never sent to clients.
    pub backend_internal_url: String,
    pub port: u16,
    pub backend_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            backend_internal_url: DEFAULT_BACKEND_URL.to_string(),
            port: DEFAULT_PROXY_PORT,
            backend_timeout: API_TIMEOUT,
        }
    }
}

impl ProxyConfig {
    /// Load from `.env` and the process environment:
    /// `BACKEND_INTERNAL_URL`, `PROXY_PORT`, `PROXY_BACKEND_TIMEOUT_SECS`
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let backend_internal_url = std::env::var("BACKEND_INTERNAL_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        url::Url::parse(&backend_internal_url)
            .context("BACKEND_INTERNAL_URL is not a valid URL")?;

        Ok(Self {
            backend_internal_url,
            port: env_parse("PROXY_PORT").unwrap_or(DEFAULT_PROXY_PORT),
            backend_timeout: env_parse("PROXY_BACKEND_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(API_TIMEOUT),
        })
    }

    /// Address the proxy binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
