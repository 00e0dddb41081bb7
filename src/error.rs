//! Service error taxonomy.
//!
//! Every operation failure belongs to one of four classes, each with a fixed
//! HTTP status. All failures render as a JSON `{"error": ...}` body — no path
//! escapes the handler boundary without an explicit response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the friend/presence services.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed input.
    #[error("{0}")]
    InvalidRequest(String),

    /// Referenced entity or relationship is absent. Also covers conditional
    /// mutations that matched no row ("not found or already processed").
    #[error("{0}")]
    NotFound(String),

    /// Current state precludes the operation — duplicate pending request,
    /// already friends, username taken.
    #[error("{0}")]
    Conflict(String),

    /// The store is unreachable or a statement failed. The underlying
    /// message is surfaced for diagnostics; callers retry, we don't.
    #[error("{0}")]
    Unavailable(String),
}

impl Error {
    /// HTTP status for this error class.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            // 400, not 409: existing clients treat duplicate-pending and
            // already-friends as bad requests.
            Error::Conflict(_) => StatusCode::BAD_REQUEST,
            Error::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Unavailable(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if matches!(self, Error::Unavailable(_)) {
            tracing::error!(error = %self, "Store operation failed");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::InvalidRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Conflict("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::Unavailable("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_message_passthrough() {
        let err = Error::Conflict("Already friends".into());
        assert_eq!(err.to_string(), "Already friends");
    }
}
