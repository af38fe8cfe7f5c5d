//! Provider listing and the observability snapshot.

use axum::{extract::State, routing::get, Json, Router};
use aperture_core::{MonitorSnapshot, ProviderInfo};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
    /// End-user markup applied to provider cost
    pub markup: &'static str,
}

/// GET /api/ai/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.registry.list(),
        markup: "2x",
    })
}

/// GET /api/ai/monitor
///
/// Recent rate-limit events, recent errors and in-flight request counts.
pub async fn monitor_snapshot(State(state): State<AppState>) -> Json<MonitorSnapshot> {
    Json(state.monitor.snapshot())
}

pub fn provider_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ai/providers", get(list_providers))
        .route("/api/ai/monitor", get(monitor_snapshot))
}
