//! Aperture gateway library interface.
//!
//! Exposes the router and shared state so the binary and the integration
//! tests build the exact same HTTP surface.

pub mod api;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

use aperture_core::{BatchTracker, Config, Monitor, ProviderError, ProviderId, ProviderRegistry, RatingProvider};
use axum::{extract::DefaultBodyLimit, http::Uri, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Default request body ceiling (base64 images inflate by a third).
const DEFAULT_BODY_LIMIT: usize = 100 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Configured providers, built once at startup
    pub registry: Arc<ProviderRegistry>,
    /// Provider batch jobs awaiting completion or collection
    pub tracker: Arc<BatchTracker>,
    /// Rate-limit log, error log and active-request gauges
    pub monitor: Arc<Monitor>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Maximum accepted request body in bytes
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(registry: ProviderRegistry, monitor: Arc<Monitor>) -> Self {
        Self {
            registry: Arc::new(registry),
            tracker: Arc::new(BatchTracker::new()),
            monitor,
            startup_time: Utc::now(),
            max_body_bytes: DEFAULT_BODY_LIMIT,
        }
    }

    /// Build the registry and monitor from configuration.
    pub fn from_config(config: &Config) -> aperture_core::Result<Self> {
        let monitor = Arc::new(Monitor::new(
            config.monitor.rate_limit_log_capacity,
            config.monitor.error_log_capacity,
        ));
        let registry = ProviderRegistry::from_config(config, monitor.clone())?;
        let mut state = Self::new(registry, monitor);
        state.tracker = Arc::new(BatchTracker::with_capacity(
            config.monitor.batch_job_capacity,
        ));
        state.max_body_bytes = config.server.max_body_mb.saturating_mul(1024 * 1024);
        Ok(state)
    }

    /// Look up a configured provider; an unconfigured one is a 400.
    pub fn provider(&self, id: ProviderId, operation: &str) -> ApiResult<Arc<dyn RatingProvider>> {
        self.registry.require(id).map_err(|e| {
            tracing::warn!(provider = %id, operation, "{e}");
            ApiError::from(e)
        })
    }

    /// Log and record a failed provider operation, then convert it.
    pub fn provider_failure(&self, id: ProviderId, operation: &str, err: ProviderError) -> ApiError {
        if err.is_capability_error() || matches!(err, ProviderError::JobNotFound { .. }) {
            tracing::warn!(provider = %id, operation, "{err}");
        } else {
            tracing::error!(provider = %id, operation, "{err}");
        }
        self.monitor
            .record_error(Some(id.as_str()), operation, &err.to_string());
        ApiError::from(err)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;

    Router::new()
        .merge(api::health_routes())
        .merge(api::provider_routes())
        .merge(api::rating_routes())
        .merge(api::batch_routes())
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
