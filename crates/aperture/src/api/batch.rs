//! Batch job lifecycle endpoints: poll, collect results, list tracked jobs.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use aperture_core::batch::TrackedJob;
use aperture_core::provider::contract::batch_unsupported;
use aperture_core::{BatchJobStatus, CostBreakdown, PhotoRating, RatingProvider};
use serde::Serialize;
use std::sync::Arc;

use super::payload::{parse_provider, require_job_id, ProviderQuery};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResultsResponse {
    pub job_id: String,
    pub results: Vec<PhotoRating>,
    pub total_results: usize,
    /// Provider usage priced at batch rates
    pub cost: CostBreakdown,
}

#[derive(Debug, Serialize)]
pub struct BatchJobsResponse {
    pub jobs: Vec<TrackedJob>,
    pub total: usize,
}

/// Resolve `?provider=` to a batch-capable provider.
fn batch_provider(
    state: &AppState,
    query: &ProviderQuery,
    operation: &str,
) -> ApiResult<Arc<dyn RatingProvider>> {
    let provider_id = parse_provider(query.provider.as_deref())?;
    let provider = state.provider(provider_id, operation)?;
    if !provider.supports_batch() {
        return Err(batch_unsupported(provider_id).into());
    }
    Ok(provider)
}

/// GET /api/ai/batch-status/:job_id?provider=
pub async fn batch_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<ProviderQuery>,
) -> ApiResult<Json<BatchJobStatus>> {
    require_job_id(&job_id)?;
    let provider = batch_provider(&state, &query, "batch-status")?;
    let status = provider
        .check_batch_status(&job_id)
        .await
        .map_err(|e| state.provider_failure(provider.id(), "batch-status", e))?;

    tracing::debug!(
        job_id = %job_id,
        status = %status.status,
        processed = status.processed_images,
        total = status.total_images,
        "Polled batch job"
    );
    state.tracker.record_status(&status);
    Ok(Json(status))
}

/// GET /api/ai/batch-results/:job_id?provider=
///
/// Ratings are reported under the submitted filenames when the job was
/// submitted through this gateway.
pub async fn batch_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<ProviderQuery>,
) -> ApiResult<Json<BatchResultsResponse>> {
    require_job_id(&job_id)?;
    let provider = batch_provider(&state, &query, "batch-results")?;
    let provider_id = provider.id();
    let mut results = provider
        .retrieve_batch_results(&job_id)
        .await
        .map_err(|e| state.provider_failure(provider_id, "batch-results", e))?;

    state
        .tracker
        .resolve_filenames(provider_id, &job_id, &mut results.ratings);
    state.tracker.complete(provider_id, &job_id);
    tracing::info!(
        provider = %provider_id,
        job_id = %job_id,
        results = results.ratings.len(),
        cost_usd = results.cost.total_cost_usd,
        "Batch results collected"
    );

    Ok(Json(BatchResultsResponse {
        total_results: results.ratings.len(),
        job_id,
        results: results.ratings,
        cost: results.cost,
    }))
}

/// GET /api/ai/batch-jobs
pub async fn batch_jobs(State(state): State<AppState>) -> Json<BatchJobsResponse> {
    let jobs = state.tracker.list();
    Json(BatchJobsResponse {
        total: jobs.len(),
        jobs,
    })
}

pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ai/batch-status/:job_id", get(batch_status))
        .route("/api/ai/batch-results/:job_id", get(batch_results))
        .route("/api/ai/batch-jobs", get(batch_jobs))
}
