use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use lookup_common::error::CommonError;
use lookup_common::upstream::{describe_transport, LookupError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidInput(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

impl AppError {
    /// Status, machine-readable kind and a caller-safe message. Upstream
    /// internals (transport errors, raw bodies, the request URL) stay in the logs.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Lookup(LookupError::Unreachable(e)) if e.is_timeout() => (
                StatusCode::GATEWAY_TIMEOUT,
                "upstream_timeout",
                "upstream lookup timed out".to_string(),
            ),
            AppError::Lookup(LookupError::Unreachable(e)) => (
                StatusCode::BAD_GATEWAY,
                "upstream_unreachable",
                format!("upstream lookup unreachable: {}", describe_transport(e)),
            ),
            AppError::Lookup(LookupError::Status { status }) => (
                StatusCode::BAD_GATEWAY,
                "upstream_status",
                format!("upstream lookup returned status {status}"),
            ),
            AppError::Lookup(LookupError::MalformedBody(_)) => (
                StatusCode::BAD_GATEWAY,
                "malformed_upstream_body",
                "upstream lookup returned a body that could not be decoded".to_string(),
            ),
            AppError::InvalidInput(message) => {
                (StatusCode::BAD_REQUEST, "invalid_input", message.clone())
            }
            AppError::Common(_) | AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, error) = self.parts();
        (status, Json(ErrorBody { error, kind })).into_response()
    }
}
