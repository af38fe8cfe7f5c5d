//! Rating endpoints: one image synchronously, or many images either fanned
//! out concurrently or submitted to the provider's batch API.

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use aperture_core::batch::{DispatchReport, Dispatcher};
use aperture_core::provider::contract::batch_unsupported;
use aperture_core::{
    calculate_user_charge, BatchRequest, BatchState, ProcessingResult, ProviderId, RatingRequest,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::payload::{json_body, parse_provider, require_prompts, ProcessBatchRequest, ProcessSingleRequest};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Response to a batch-API submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmitted {
    pub job_id: String,
    pub provider: ProviderId,
    pub status: BatchState,
    pub total_images: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    /// Provider cost of the whole job at batch rates
    #[serde(rename = "estimatedCostUSD", skip_serializing_if = "Option::is_none")]
    pub estimated_cost_usd: Option<f64>,
    #[serde(rename = "estimatedUserChargeUSD", skip_serializing_if = "Option::is_none")]
    pub estimated_user_charge_usd: Option<f64>,
    pub message: String,
}

/// Either shape `process-batch` can answer with.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProcessBatchResponse {
    Submitted(BatchSubmitted),
    Concurrent(DispatchReport),
}

/// POST /api/ai/process-single
pub async fn process_single(
    State(state): State<AppState>,
    body: Result<Json<ProcessSingleRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessingResult>> {
    let payload = json_body(body)?;
    let provider_id = parse_provider(payload.provider.as_deref())?;
    let image = payload
        .image
        .ok_or_else(|| ApiError::bad_request("image is required"))?
        .into_input()?;
    let (system_prompt, user_prompt) = require_prompts(payload.system_prompt, payload.user_prompt)?;
    let provider = state.provider(provider_id, "process-single")?;

    tracing::debug!(provider = %provider_id, filename = %image.filename, "Rating single image");
    let request = RatingRequest {
        image,
        system_prompt,
        user_prompt,
    };
    let _active = state.monitor.track_request(provider_id.as_str());
    let result = provider
        .process_single_image(&request)
        .await
        .map_err(|e| state.provider_failure(provider_id, "process-single", e))?;
    Ok(Json(result))
}

/// POST /api/ai/process-batch
pub async fn process_batch(
    State(state): State<AppState>,
    body: Result<Json<ProcessBatchRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessBatchResponse>> {
    let payload = json_body(body)?;
    let provider_id = parse_provider(payload.provider.as_deref())?;
    if payload.images.is_empty() {
        return Err(ApiError::bad_request("images must be a non-empty array"));
    }
    let images = payload
        .images
        .into_iter()
        .map(|image| image.into_input())
        .collect::<ApiResult<Vec<_>>>()?;
    let (system_prompt, user_prompt) = require_prompts(payload.system_prompt, payload.user_prompt)?;
    let provider = state.provider(provider_id, "process-batch")?;

    let request = BatchRequest {
        images,
        system_prompt,
        user_prompt,
    };

    if !payload.use_batch_api {
        let dispatcher = Dispatcher::new(provider, state.monitor.clone());
        let report = dispatcher.dispatch(request).await;
        return Ok(Json(ProcessBatchResponse::Concurrent(report)));
    }

    if !provider.supports_batch() {
        return Err(batch_unsupported(provider_id).into());
    }

    let filenames: Vec<String> = request.images.iter().map(|i| i.filename.clone()).collect();
    let job = provider
        .submit_batch(&request)
        .await
        .map_err(|e| state.provider_failure(provider_id, "submit-batch", e))?;
    state.tracker.insert(&job, filenames);
    let estimated_cost_usd = provider
        .batch_cost_per_image()
        .map(|per_image| per_image * job.total_images as f64);
    tracing::info!(
        provider = %provider_id,
        job_id = %job.job_id,
        images = job.total_images,
        estimated_cost_usd,
        "Batch job tracked"
    );

    Ok(Json(ProcessBatchResponse::Submitted(BatchSubmitted {
        message: format!(
            "Batch job submitted to {}. Poll /api/ai/batch-status/{}?provider={} for progress.",
            provider.name(),
            job.job_id,
            provider_id
        ),
        job_id: job.job_id,
        provider: provider_id,
        status: job.status,
        total_images: job.total_images,
        estimated_completion: job.estimated_completion,
        estimated_cost_usd,
        estimated_user_charge_usd: estimated_cost_usd.map(calculate_user_charge),
    })))
}

pub fn rating_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ai/process-single", post(process_single))
        .route("/api/ai/process-batch", post(process_batch))
}
