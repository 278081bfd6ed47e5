//! Secure API client
//!
//! The only sanctioned network egress of the app. Every request:
//! - resolves the active endpoint (re-read per attempt, never cached)
//! - is guarded against the forbidden backend port, for the full URL and
//!   the base endpoint independently
//! - never follows redirects; a 3xx is an error and its `Location` is
//!   guarded too
//! - retries transient failures with linear backoff

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, Instrument};
use uuid::Uuid;

use super::error::{codes, normalize_error, ApiError, ClientError, Failure, REDIRECT_MESSAGE};
use super::guard::{BackendAccessForbidden, DestinationGuard};
use super::transport::{
    HttpTransport, RequestContext, Transport, TransportFailure, TransportResponse,
};
use crate::config::{ClientConfig, CLIENT_HEADER, TIMESTAMP_HEADER};

/// Source of the active base endpoint
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self) -> String;
}

/// Endpoint fixed at construction
#[derive(Debug, Clone)]
pub struct FixedEndpoint(pub String);

impl EndpointResolver for FixedEndpoint {
    fn resolve(&self) -> String {
        self.0.clone()
    }
}

/// `Request -> Request` step, run in order before the transport
pub type RequestStage = Box<dyn Fn(RequestContext) -> Result<RequestContext, Failure> + Send + Sync>;

/// `Response -> Response | Error` step, run in order after the transport
pub type ResponseStage =
    Box<dyn Fn(TransportResponse, &RequestContext) -> Result<TransportResponse, Failure> + Send + Sync>;

/// Secure API client. Construct once at the composition root and share
/// via `Arc`.
pub struct ApiClient {
    config: ClientConfig,
    guard: DestinationGuard,
    endpoint: Arc<dyn EndpointResolver>,
    transport: Arc<dyn Transport>,
    request_stages: Vec<RequestStage>,
    response_stages: Vec<ResponseStage>,
}

impl ApiClient {
    /// Client against the configured fixed endpoint over HTTP
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let endpoint = Arc::new(FixedEndpoint(config.base_url.clone()));
        let transport = Arc::new(HttpTransport::new(config.timeout)?);
        Ok(Self::with_parts(config, endpoint, transport))
    }

    /// Client with a custom endpoint source and transport
    pub fn with_parts(
        config: ClientConfig,
        endpoint: Arc<dyn EndpointResolver>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let guard = DestinationGuard::new(config.forbidden_port);

        let request_stages: Vec<RequestStage> = vec![
            guard_destination(guard),
            attach_client_headers(config.client_identifier.clone(), config.send_timestamp),
            Box::new(log_request),
        ];
        let response_stages: Vec<ResponseStage> =
            vec![reject_redirects(guard), Box::new(classify_status)];

        Self {
            config,
            guard,
            endpoint,
            transport,
            request_stages,
            response_stages,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Currently active base endpoint
    pub fn resolve_endpoint(&self) -> String {
        self.endpoint.resolve()
    }

    /// Fail if `url` targets the forbidden port. Relative URLs resolve
    /// against the active endpoint.
    pub fn assert_allowed_destination(&self, url: &str) -> Result<(), BackendAccessForbidden> {
        self.guard.check(url, &self.resolve_endpoint())
    }

    /// GET `path` with optional query parameters
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, ClientError> {
        self.request(Method::GET, path, params, None).await
    }

    /// POST a JSON body to `path`
    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ClientError> {
        self.request(Method::POST, path, &[], body).await
    }

    /// Execute a logical request, retrying transient failures
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let mut template = RequestContext::new(method.clone(), path);
        template.query = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        template.body = body;

        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!("api_request", %request_id, %method, path = %strip_query(path));
        self.execute(template).instrument(span).await
    }

    async fn execute(&self, template: RequestContext) -> Result<Value, ClientError> {
        let mut attempt = 0;

        loop {
            let mut ctx = template.clone();
            ctx.attempt = attempt;

            match self.attempt(ctx).await {
                Ok(body) => return Ok(body),
                Err(Failure::Forbidden(e)) => return Err(e.into()),
                Err(Failure::Transport(failure)) if self.should_retry(&failure, attempt) => {
                    attempt += 1;
                    debug!("Retrying request (attempt {})", attempt);
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }
                Err(other) => return Err(normalize_error(other).into()),
            }
        }
    }

    /// Retry iff budget remains and the failure is transient
    fn should_retry(&self, failure: &TransportFailure, attempt: u32) -> bool {
        attempt < self.config.max_retries && failure.is_transient()
    }

    async fn attempt(&self, mut ctx: RequestContext) -> Result<Value, Failure> {
        ctx.base_url = self.resolve_endpoint();

        let ctx = self
            .request_stages
            .iter()
            .try_fold(ctx, |ctx, stage| stage(ctx))?;

        let response = self.transport.execute(&ctx).await?;

        let response = self
            .response_stages
            .iter()
            .try_fold(response, |response, stage| stage(response, &ctx))?;

        Ok(response.body)
    }
}

// =============================================================================
// Request Stages
// =============================================================================

fn guard_destination(guard: DestinationGuard) -> RequestStage {
    Box::new(move |ctx: RequestContext| -> Result<RequestContext, Failure> {
        guard.check(&ctx.full_url(), &ctx.base_url)?;
        // Checked on its own so a bad override is caught even if the path
        // would mask it
        guard.check(&ctx.base_url, &ctx.base_url)?;
        Ok(ctx)
    })
}

fn attach_client_headers(client_identifier: String, send_timestamp: bool) -> RequestStage {
    Box::new(move |mut ctx: RequestContext| -> Result<RequestContext, Failure> {
        ctx.headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        ctx.set_header(CLIENT_HEADER, &client_identifier);
        if send_timestamp {
            let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            ctx.set_header(TIMESTAMP_HEADER, &now);
        }
        Ok(ctx)
    })
}

/// Method and path only: no host, no query string
fn log_request(ctx: RequestContext) -> Result<RequestContext, Failure> {
    debug!("→ {} {}", ctx.method, strip_query(&ctx.path));
    Ok(ctx)
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or("/")
}

// =============================================================================
// Response Stages
// =============================================================================

fn reject_redirects(guard: DestinationGuard) -> ResponseStage {
    Box::new(
        move |response: TransportResponse,
              ctx: &RequestContext|
              -> Result<TransportResponse, Failure> {
            if !(300..400).contains(&response.status) {
                return Ok(response);
            }

            let location = response.location();
            if let Some(location) = &location {
                guard.check(location, &ctx.base_url)?;
            }

            let mut meta = serde_json::Map::new();
            meta.insert(
                "location".to_string(),
                location.map(Value::String).unwrap_or(Value::Null),
            );
            meta.insert("status".to_string(), Value::from(response.status));
            Err(Failure::Api(
                ApiError::new(codes::SERVER_ERROR, REDIRECT_MESSAGE).with_meta(meta),
            ))
        },
    )
}

fn classify_status(
    response: TransportResponse,
    _ctx: &RequestContext,
) -> Result<TransportResponse, Failure> {
    if response.status >= 400 {
        return Err(Failure::Transport(TransportFailure::from_response(&response)));
    }
    Ok(response)
}
