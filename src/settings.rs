//! Instance settings
//!
//! The base endpoint is fixed at build/startup time. The persisted instance
//! URL is still read and written for compatibility with older settings
//! files, but it never changes where requests go.

use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::{ApiClient, DestinationGuard};
use crate::config::VALIDATION_TIMEOUT;
use crate::store::{keys, KeyValueStore};

/// Instance URL management
pub struct InstanceSettings {
    client: Arc<ApiClient>,
    store: Arc<dyn KeyValueStore>,
    http: reqwest::Client,
}

impl InstanceSettings {
    pub fn new(client: Arc<ApiClient>, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::with_timeout(client, store, VALIDATION_TIMEOUT)
    }

    /// Settings service with a custom validation timeout
    pub fn with_timeout(
        client: Arc<ApiClient>,
        store: Arc<dyn KeyValueStore>,
        timeout: Duration,
    ) -> Result<Self> {
        // Separate client: validation must not go through the request
        // pipeline bound to the active endpoint
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build validation HTTP client")?;

        Ok(Self {
            client,
            store,
            http,
        })
    }

    /// The active instance URL
    pub fn instance_url(&self) -> String {
        self.client.resolve_endpoint()
    }

    /// Persisted override, if any. Not used for resolution.
    pub fn stored_instance_url(&self) -> Result<Option<String>> {
        self.store.get(keys::INSTANCE_URL)
    }

    /// Persist an instance URL, trailing slashes removed
    pub fn set_instance_url(&self, url: &str) -> Result<String> {
        let normalized = normalize_url(url).to_string();
        self.store.set(keys::INSTANCE_URL, &normalized)?;
        info!("Stored instance URL (the active endpoint is unchanged)");
        Ok(normalized)
    }

    /// True if `url` looks like a reachable P-Stream proxy.
    ///
    /// URLs targeting the forbidden port are rejected without any request.
    /// Otherwise `/meta` must answer 200, with `/ping` as a fallback.
    pub async fn validate_instance_url(&self, url: &str) -> bool {
        let normalized = normalize_url(url);

        let guard = DestinationGuard::new(self.client.config().forbidden_port);
        if let Err(e) = guard.check(normalized, normalized) {
            debug!("Instance rejected: {}", e);
            return false;
        }

        for probe in ["meta", "ping"] {
            if self.probe(&format!("{}/{}", normalized, probe)).await {
                return true;
            }
        }
        false
    }

    async fn probe(&self, url: &str) -> bool {
        match self.http.get(url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("Instance probe failed: {}", e);
                false
            }
        }
    }

    /// Forget the persisted instance URL
    pub fn reset_instance_url(&self) -> Result<()> {
        self.store.remove(keys::INSTANCE_URL)
    }
}

fn normalize_url(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}
