//! Error types for the cloudkeep backend
//!
//! All errors use thiserror for structured error handling.
//! Every variant maps to exactly one HTTP status and error code,
//! so handlers can bubble errors with `?` and let the response
//! layer do the translation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Authentication required.")]
    Unauthorized,

    #[error("Token is invalid or expired.")]
    InvalidToken,

    #[error("Access denied.")]
    Forbidden,

    #[error("{0} not found.")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage quota exceeded.")]
    QuotaExceeded,

    #[error("File type not supported.")]
    UnsupportedMediaType,

    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Wire-level error code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "INVALID_INPUT",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::QuotaExceeded => "QUOTA_EXCEEDED",
            AppError::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            _ => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::QuotaExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail never reaches the client.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self);
            "An unexpected error occurred.".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({
            "status": "error",
            "error": {
                "code": self.code(),
                "message": message,
            },
        });

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
