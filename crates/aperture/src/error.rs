//! HTTP error mapping for the gateway.
//!
//! Every failure leaves the gateway as `{error, message}`: 400 for request
//! shape and capability problems, 404 for unknown batch jobs, 500 for
//! processing failures. No stack traces or provider internals beyond the
//! provider's own error text.

use aperture_core::ProviderError;
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
    /// Malformed or incomplete request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Unknown resource (404)
    #[error("{0}")]
    NotFound(String),

    /// A provider operation failed
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Provider(ProviderError::JobNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Provider(e) if e.is_capability_error() => StatusCode::BAD_REQUEST,
            ApiError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let label = match status {
            StatusCode::BAD_REQUEST => "Invalid request",
            StatusCode::NOT_FOUND => "Not found",
            _ => "Processing failed",
        };
        let body = Json(json!({
            "error": label,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
