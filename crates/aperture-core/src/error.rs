//! Error types for the Aperture rating gateway.
//!
//! Errors are split by concern: configuration problems are caught at startup,
//! provider errors describe one failed call and carry enough structure
//! (HTTP status, `Retry-After` hint) for the retry engine to classify them.

use crate::types::BatchState;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for Aperture operations.
#[derive(Error, Debug)]
pub enum ApertureError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider call errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised by a single provider operation.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("{provider} request failed: {message}")]
    Network { provider: String, message: String },

    /// The provider answered with a non-success status.
    #[error("{provider} HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
        /// Delay hinted by the provider via `Retry-After`
        retry_after: Option<Duration>,
    },

    /// The provider answered 2xx but the body could not be understood.
    #[error("{provider} returned an unusable response: {message}")]
    Parse { provider: String, message: String },

    /// Batch operation requested on a provider without a batch API.
    #[error("{provider} does not support the batch API; use concurrent processing instead")]
    BatchUnsupported { provider: String },

    /// The provider does not know the job.
    #[error("Batch job {job_id} not found")]
    JobNotFound { job_id: String },

    /// Results were requested before the job reached `completed`.
    #[error("Batch job {job_id} is not complete (status: {status})")]
    JobNotComplete { job_id: String, status: BatchState },

    /// Provider is missing credentials or otherwise unusable.
    #[error("{provider} is not configured: {message}")]
    NotConfigured { provider: String, message: String },
}

impl ProviderError {
    /// HTTP status returned by the provider, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the provider signalled a rate limit (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Provider-declared delay before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Capability errors cannot be fixed by retrying and map to HTTP 400.
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            ProviderError::BatchUnsupported { .. }
                | ProviderError::JobNotComplete { .. }
                | ProviderError::NotConfigured { .. }
        )
    }
}

/// Convenience type alias for Aperture results.
pub type Result<T> = std::result::Result<T, ApertureError>;

/// Convenience type alias for provider-call results.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
