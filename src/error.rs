//! Shared error kinds for the bridge, strategy framework, and audit pipeline.
//!
//! These are propagated through completion handles and read-path results;
//! the HTTP boundary (out of scope here) maps them to status codes via
//! `IntoResponse`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// A core error. Validation errors are returned before any state change;
/// everything else surfaces through a completion handle or read result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Validation failed before any side effect occurred.
    InvalidInput(String),
    /// The component hasn't been started (or was stopped).
    NotRunning,
    /// `start()` called while already running.
    AlreadyRunning,
    /// Subscription id, strategy id, or order id not found.
    NotFound(String),
    /// A bounded queue was full; the caller's item was dropped.
    QueueFull,
    /// Audit segment I/O failed (open/write/rotate/delete).
    IoError(String),
    /// The engine adapter rejected or failed to process a request.
    AdapterError(String),
    /// Operation not supported by this instance (e.g. hot-reload).
    Unsupported(String),
    /// No `AuthInfo` present on a protected path.
    Unauthenticated,
    /// `AuthInfo` present but missing the required permission.
    Unauthorized,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NotRunning => write!(f, "not running"),
            Self::AlreadyRunning => write!(f, "already running"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::QueueFull => write!(f, "queue full"),
            Self::IoError(msg) => write!(f, "io error: {msg}"),
            Self::AdapterError(msg) => write!(f, "adapter error: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Error bodies never disclose which credential component was wrong,
        // and never echo adapter/io internals verbatim to the caller.
        let (status, message) = match &self {
            Self::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid input".to_string()),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated".to_string()),
            Self::Unauthorized => (StatusCode::FORBIDDEN, "forbidden".to_string()),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::AlreadyRunning | Self::NotRunning => {
                (StatusCode::CONFLICT, self.to_string())
            }
            Self::QueueFull
            | Self::IoError(_)
            | Self::AdapterError(_)
            | Self::Unsupported(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        };
        (status, message).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_status_codes() {
        assert_eq!(
            GatewayError::InvalidInput("bad".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Unauthorized.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::NotFound("sub-1".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::AlreadyRunning.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::NotRunning.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::AdapterError("timeout".into())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_never_echoes_internals() {
        let resp = GatewayError::IoError("disk full at /secret/path".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
