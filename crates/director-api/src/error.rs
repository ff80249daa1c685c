//! Error types for director-api

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// director-api error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Synchronous invocation requested
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Core error: {0}")]
    Core(#[from] director_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

/// Error body returned to HTTP callers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            ApiError::NotSupported(_) | ApiError::Core(director_core::Error::NotSupported(_)) => {
                (StatusCode::NOT_IMPLEMENTED, "NotSupportedError")
            }
            ApiError::Core(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!("Request failed: {}", self);
        }

        let message = match &self {
            ApiError::Core(director_core::Error::NotSupported(msg)) | ApiError::NotSupported(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error: kind.to_string(),
                message,
            }),
        )
            .into_response()
    }
}
