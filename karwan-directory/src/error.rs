//! Error types for the HTTP surface
//!
//! Every failure is answered with
//! `{"error": {"code": ..., "message": ..., "fields": [...]}}`; `fields`
//! is only present for validation failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use karwan_common::validation::ValidationErrors;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::render::RenderError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Submission rejected field by field (400)
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or wrong admin credential (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Admin routes disabled (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Identity already registered (409)
    #[error("{0}")]
    Duplicate(String),

    /// Artifact rendering failed (500); stored data is unaffected
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<karwan_common::Error> for ApiError {
    fn from(err: karwan_common::Error) -> Self {
        use karwan_common::Error;

        match err {
            Error::Validation(errors) => ApiError::Validation(errors),
            Error::DuplicateIdentity(_) => ApiError::Duplicate(err.to_string()),
            Error::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Duplicate(_) => (StatusCode::CONFLICT, "DUPLICATE_IDENTITY"),
            ApiError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_FAILED"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            error!("{}", self);
        }

        let body = match &self {
            ApiError::Validation(errors) => json!({
                "error": {
                    "code": code,
                    "message": self.to_string(),
                    "fields": errors,
                }
            }),
            _ => json!({
                "error": {
                    "code": code,
                    "message": self.to_string(),
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
