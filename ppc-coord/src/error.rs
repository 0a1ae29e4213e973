//! Error types for ppc-coord
//!
//! One taxonomy for every caller-facing operation: validation, not-found,
//! and state errors surface verbatim and are never retried; persistence
//! errors carry enough context to identify which write failed; upstream
//! errors mark the workflow engine / storage side as the culprit.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown identifier (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation invalid for the entity's current lifecycle state (409)
    #[error("State error: {0}")]
    State(String),

    /// Datastore write failure (500); the message names the failed step
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Storage / workflow engine unreachable or non-2xx (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Service misconfiguration, e.g. no engine endpoint (500)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ppc_common::Error> for ApiError {
    fn from(err: ppc_common::Error) -> Self {
        match err {
            ppc_common::Error::InvalidInput(msg) => ApiError::Validation(msg),
            ppc_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            ppc_common::Error::State(msg) => ApiError::State(msg),
            ppc_common::Error::Database(e) => ApiError::Persistence(e.to_string()),
            ppc_common::Error::Upstream(msg) => ApiError::Upstream(msg),
            ppc_common::Error::Config(msg) => ApiError::Configuration(msg),
            ppc_common::Error::Io(e) => ApiError::Internal(e.to_string()),
            ppc_common::Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Persistence(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::State(msg) => (StatusCode::CONFLICT, "STATE_ERROR", msg),
            ApiError::Persistence(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_ERROR",
                msg,
            ),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIGURATION_ERROR",
                msg,
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
