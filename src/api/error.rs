//! Error normalization
//!
//! Every failure that crosses the client boundary is collapsed into an
//! [`ApiError`]: a small integer code, a message and optional metadata.

use serde_json::{json, Map, Value};
use thiserror::Error;

use super::guard::BackendAccessForbidden;
use super::transport::TransportFailure;

/// Error codes. Negative codes are client-side conditions, positive codes
/// mirror HTTP status.
pub mod codes {
    /// Network connectivity issue
    pub const NETWORK_ERROR: i32 = -1;
    /// Request timed out
    pub const TIMEOUT: i32 = -2;
    /// Server returned an invalid/unexpected response
    pub const INVALID_RESPONSE: i32 = -3;
    /// Mock mode, no real backend
    pub const MOCK_MODE: i32 = -4;
    /// Instance validation failed
    pub const INVALID_INSTANCE: i32 = -5;
    pub const CLIENT_ERROR: i32 = 400;
    pub const UNAUTHORIZED: i32 = 401;
    pub const FORBIDDEN: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const SERVER_ERROR: i32 = 500;
}

pub const TIMEOUT_MESSAGE: &str = "Request timed out";
pub const NETWORK_MESSAGE: &str = "Network error - check your connection";
pub const SERVER_ERROR_MESSAGE: &str = "Server error";
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";
pub const REDIRECT_MESSAGE: &str = "Unexpected redirect from proxy. Redirects are not supported.";

/// Normalized API error
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// One of [`codes`] or an HTTP status
    pub code: i32,
    pub message: String,
    pub meta: Option<Map<String, Value>>,
}

impl ApiError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Network or timeout
    pub fn is_network(&self) -> bool {
        self.code == codes::NETWORK_ERROR || self.code == codes::TIMEOUT
    }

    /// 5xx
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// Diagnostic record of the failure this error was built from
    pub fn original_error(&self) -> Option<&Value> {
        self.meta.as_ref().and_then(|m| m.get("originalError"))
    }
}

/// Anything that can be normalized
#[derive(Debug, Clone)]
pub enum Failure {
    /// Already normalized
    Api(ApiError),
    /// Guard violation
    Forbidden(BackendAccessForbidden),
    /// Raw transport outcome
    Transport(TransportFailure),
    /// Failure from outside the transport, e.g. a body that would not decode
    Unexpected { message: Option<String> },
}

impl Failure {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Failure::Unexpected {
            message: Some(message.into()),
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Failure::Api(e) => Some(&e.message),
            Failure::Forbidden(_) => None,
            Failure::Transport(t) => t.message(),
            Failure::Unexpected { message } => message.as_deref(),
        }
    }

    /// JSON description kept under `meta.originalError`
    fn describe(&self) -> Value {
        match self {
            Failure::Api(e) => json!({ "kind": "api", "code": e.code, "message": e.message }),
            Failure::Forbidden(e) => json!({
                "kind": "forbidden",
                "url": e.url,
                "port": e.port,
                "message": e.to_string(),
            }),
            Failure::Transport(t) => serde_json::to_value(t).unwrap_or(Value::Null),
            Failure::Unexpected { message } => json!({ "kind": "unexpected", "message": message }),
        }
    }
}

impl From<ApiError> for Failure {
    fn from(e: ApiError) -> Self {
        Failure::Api(e)
    }
}

impl From<TransportFailure> for Failure {
    fn from(e: TransportFailure) -> Self {
        Failure::Transport(e)
    }
}

impl From<BackendAccessForbidden> for Failure {
    fn from(e: BackendAccessForbidden) -> Self {
        Failure::Forbidden(e)
    }
}

/// Collapse a failure into an [`ApiError`]. First matching rule wins:
///
/// 1. already normalized: returned unchanged
/// 2. upstream HTTP response: its status and message
/// 3. aborted, or message mentions "timeout": [`codes::TIMEOUT`]
/// 4. no response, or message mentions "Network Error": [`codes::NETWORK_ERROR`]
/// 5. any message: [`codes::SERVER_ERROR`] with that message
/// 6. otherwise: [`codes::SERVER_ERROR`], generic message
pub fn normalize_error(failure: impl Into<Failure>) -> ApiError {
    let failure = failure.into();

    let (code, message) = match &failure {
        Failure::Api(e) => return e.clone(),
        Failure::Transport(TransportFailure::HttpStatus { status, body, .. }) => {
            let code = if *status == 0 {
                codes::SERVER_ERROR
            } else {
                i32::from(*status)
            };
            let message = body
                .as_ref()
                .and_then(|b| b.get("message"))
                .and_then(Value::as_str)
                .unwrap_or(SERVER_ERROR_MESSAGE)
                .to_string();
            (code, message)
        }
        Failure::Transport(TransportFailure::Aborted { .. }) => {
            (codes::TIMEOUT, TIMEOUT_MESSAGE.to_string())
        }
        _ if failure.message().is_some_and(|m| m.contains("timeout")) => {
            (codes::TIMEOUT, TIMEOUT_MESSAGE.to_string())
        }
        Failure::Transport(TransportFailure::NoResponse { .. }) => {
            (codes::NETWORK_ERROR, NETWORK_MESSAGE.to_string())
        }
        _ if failure.message().is_some_and(|m| m.contains("Network Error")) => {
            (codes::NETWORK_ERROR, NETWORK_MESSAGE.to_string())
        }
        Failure::Forbidden(e) => (codes::SERVER_ERROR, e.to_string()),
        _ => match failure.message().filter(|m| !m.is_empty()) {
            Some(message) => (codes::SERVER_ERROR, message.to_string()),
            None => (codes::SERVER_ERROR, UNEXPECTED_MESSAGE.to_string()),
        },
    };

    let mut meta = Map::new();
    meta.insert("originalError".to_string(), failure.describe());
    ApiError::new(code, message).with_meta(meta)
}

/// True for network-level failures (no response, timeout)
pub fn is_network_error(failure: &Failure) -> bool {
    match failure {
        Failure::Api(e) => e.is_network(),
        Failure::Transport(TransportFailure::NoResponse { .. })
        | Failure::Transport(TransportFailure::Aborted { .. }) => true,
        other => other
            .message()
            .is_some_and(|m| m.contains("Network Error") || m.contains("timeout")),
    }
}

/// True iff the failure is already a normalized [`ApiError`]
pub fn is_api_error(failure: &Failure) -> bool {
    matches!(failure, Failure::Api(_))
}

/// Error returned by client and adapter operations
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Configuration/programming defect, never retried
    #[error(transparent)]
    Forbidden(#[from] BackendAccessForbidden),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ClientError {
    pub fn is_network_error(&self) -> bool {
        matches!(self, ClientError::Api(e) if e.is_network())
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(e) => Some(e),
            ClientError::Forbidden(_) => None,
        }
    }
}
