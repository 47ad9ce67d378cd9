//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use tracing::error;

use buzza_core::error::BuzzaError;

/// Message returned for every 5xx; details only go to the log.
const INTERNAL_MESSAGE: &str = "Internal server error";

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    // Common error constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Log `detail` and answer with a generic 500.
    pub fn internal(detail: impl fmt::Display) -> Self {
        error!(error = %detail, "Internal error while serving request");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            INTERNAL_MESSAGE,
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

// Convert from buzza-core errors
impl From<BuzzaError> for ApiError {
    fn from(err: BuzzaError) -> Self {
        match err {
            BuzzaError::NotFound { .. } => ApiError::not_found("Not Found"),
            BuzzaError::Validation { message, .. } => ApiError::bad_request(message),
            err @ BuzzaError::Integrity { .. } => ApiError::internal(err),
            err @ BuzzaError::Database { .. } => ApiError::internal(err),
            err @ BuzzaError::Configuration(_) => ApiError::internal(err),
            err @ BuzzaError::Serialization(_) => ApiError::internal(err),
            err @ BuzzaError::Io(_) => ApiError::internal(err),
            err @ BuzzaError::Internal(_) => ApiError::internal(err),
        }
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_map_to_status() {
        let cases = [
            (BuzzaError::not_found("program x"), StatusCode::NOT_FOUND),
            (BuzzaError::missing_field("os"), StatusCode::BAD_REQUEST),
            (
                BuzzaError::integrity("too many results (2)"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                BuzzaError::database("disk I/O error"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                BuzzaError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_detail_is_not_leaked() {
        let api = ApiError::from(BuzzaError::integrity("too many results (3) for program a/b/c/d"));
        assert_eq!(api.message, INTERNAL_MESSAGE);
        assert!(!api.message.contains("too many"));
    }

    #[test]
    fn test_validation_message_is_kept() {
        let api = ApiError::from(BuzzaError::missing_field("arch"));
        assert_eq!(api.message, "missing arch");
        assert_eq!(api.code, "BAD_REQUEST");
    }
}
