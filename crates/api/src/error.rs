//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use sitewarden_shared::{AliasError, ValidationErrors};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Validation errors
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,
    #[error("No site matches host {0:?}")]
    UnknownHost(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                errors.to_string(),
                Some(json!(errors.violations())),
            ),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string(), None)
            }
            ApiError::UnknownHost(_) => {
                (StatusCode::NOT_FOUND, "UNKNOWN_HOST", self.to_string(), None)
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None),
            ApiError::InconsistentState(msg) => {
                (StatusCode::CONFLICT, "INCONSISTENT_STATE", msg.clone(), None)
            }
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database error".to_string(),
                None,
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
                None,
            ),
        };

        if status.is_server_error() {
            tracing::error!("{:?}", self);
        }

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let (Some(details), Some(obj)) = (details, error.as_object_mut()) {
            obj.insert("details".to_string(), details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<AliasError> for ApiError {
    fn from(err: AliasError) -> Self {
        match err {
            AliasError::InvalidHost(host) => {
                ApiError::BadRequest(format!("invalid host: {host:?}"))
            }
            AliasError::Validation(errors) => ApiError::Validation(errors),
            AliasError::InconsistentState(msg) => ApiError::InconsistentState(msg),
            AliasError::Conflict(msg) => ApiError::Conflict(msg),
            AliasError::Configuration(msg) => ApiError::Internal(msg),
            AliasError::Database(msg) => ApiError::Database(msg),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::from(AliasError::from(err))
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
