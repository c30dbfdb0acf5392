use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Process-level failures (startup, configuration, binding)
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),
}

// Implement alias for Result to simplify usage
pub type AppResult<T> = Result<T, AppError>;

/// Classification carried by every error crossing the public boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ValidationError,
    AuthError,
    RequestError,
    UpstreamUnavailable,
    UpstreamProtocolError,
}

/// Request-scoped failure of a gateway call
///
/// `Clone` is required so a single in-flight token refresh can hand the same
/// outcome to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication failed: {message}")]
    Auth { status: Option<u16>, message: String },

    #[error("Upstream rejected request (HTTP {status}): {message}")]
    Request { status: u16, message: String },

    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { status: Option<u16>, message: String },

    #[error("Unexpected upstream response (HTTP {status}): {message}")]
    UpstreamProtocol { status: u16, message: String },
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Validation(_) => ErrorKind::ValidationError,
            GatewayError::Auth { .. } => ErrorKind::AuthError,
            GatewayError::Request { .. } => ErrorKind::RequestError,
            GatewayError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            GatewayError::UpstreamProtocol { .. } => ErrorKind::UpstreamProtocolError,
        }
    }

    /// Status reported by the upstream or identity provider, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            GatewayError::Validation(_) => None,
            GatewayError::Auth { status, .. } => *status,
            GatewayError::Request { status, .. } => Some(*status),
            GatewayError::UpstreamUnavailable { status, .. } => *status,
            GatewayError::UpstreamProtocol { status, .. } => Some(*status),
        }
    }

    /// Status code rendered to the caller
    pub fn http_status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Auth { status, .. } => match status {
                Some(403) => StatusCode::FORBIDDEN,
                Some(_) => StatusCode::UNAUTHORIZED,
                None => StatusCode::BAD_GATEWAY,
            },
            GatewayError::Request { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error())
                .unwrap_or(StatusCode::BAD_REQUEST),
            GatewayError::UpstreamUnavailable { status, .. } => match status {
                Some(429) | Some(503) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
            GatewayError::UpstreamProtocol { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            GatewayError::Validation(message) => message,
            GatewayError::Auth { message, .. }
            | GatewayError::Request { message, .. }
            | GatewayError::UpstreamUnavailable { message, .. }
            | GatewayError::UpstreamProtocol { message, .. } => message,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "kind": self.kind(),
            "message": self.message(),
        });
        if let Some(status) = self.upstream_status() {
            error["upstream_status"] = json!(status);
        }
        (self.http_status(), Json(json!({ "error": error }))).into_response()
    }
}
