use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors surfaced to proxy clients. None of them carry backend addresses.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Backend answered with a non-success status
    #[error("backend responded with {status}")]
    Backend {
        status: StatusCode,
        body: Option<Value>,
    },

    /// Backend could not be reached
    #[error("unable to reach upstream service")]
    BadGateway,

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Backend path would not match the route that built it
    #[error("rejected backend path")]
    PathRejected,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ProxyError::Backend { status, body } => {
                let status_message = if status.is_server_error() {
                    "Backend Error"
                } else {
                    "Request Failed"
                };
                let mut payload = json!({
                    "statusCode": status.as_u16(),
                    "statusMessage": status_message,
                });
                if let Some(data) = body {
                    payload["data"] = data;
                }
                (status, payload)
            }
            ProxyError::BadGateway => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "statusCode": 502,
                    "statusMessage": "Bad Gateway",
                    "message": "Unable to reach upstream service",
                }),
            ),
            ProxyError::MissingParameter(name) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "statusCode": 400,
                    "statusMessage": "Bad Request",
                    "message": format!("Missing required parameter: {}", name),
                }),
            ),
            ProxyError::InvalidParameter(name) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "statusCode": 400,
                    "statusMessage": "Bad Request",
                    "message": format!("Invalid parameter: {}", name),
                }),
            ),
            ProxyError::PathRejected => (
                StatusCode::BAD_REQUEST,
                json!({
                    "statusCode": 400,
                    "statusMessage": "Bad Request",
                    "message": "Invalid request path",
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
