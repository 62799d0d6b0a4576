//! Error types for the pdffill service

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdffill::FormError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Request failures, grouped by what the caller can do about them
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed request: missing source, bad `fields`, not a PDF, ...
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The `pdfUrl` source could not be fetched
    #[error("Download failed: {0}")]
    Download(String),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine readable error kind
    pub error: String,
    /// Human-readable error message describing what went wrong
    pub message: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Download(msg) => (StatusCode::BAD_GATEWAY, "download_failed", msg.clone()),
            AppError::Form(e) if e.is_open_failure() => {
                (StatusCode::UNPROCESSABLE_ENTITY, "open_failed", e.to_string())
            }
            AppError::Form(e @ (FormError::InvalidHeader | FormError::InvalidInput(_))) => {
                (StatusCode::BAD_REQUEST, "bad_request", e.to_string())
            }
            AppError::Form(e) => {
                tracing::error!("PDF processing error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.parts();
        let body = ErrorResponse {
            error: error.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<MultipartRejection> for AppError {
    fn from(err: MultipartRejection) -> Self {
        AppError::BadRequest(format!("Expected a multipart/form-data body: {}", err.body_text()))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("Failed to read multipart field: {}", err.body_text()))
    }
}
