//! Concurrent dispatch engine for multi-image rating requests.
//!
//! Every image is sent at once, one tokio task each, with no client-side
//! throttling: providers signal their own limits and the retry engine inside
//! each adapter absorbs them. Failures become per-item errors instead of
//! failing the whole request, and results keep the input order.
//!
//! The tasks live in a [`JoinSet`], so dropping an unfinished dispatch (the
//! client went away) aborts every outstanding provider call.

use crate::cost::CostBreakdown;
use crate::monitor::Monitor;
use crate::provider::RatingProvider;
use crate::types::{BatchRequest, PhotoRating, RatingRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Outcome for one image. Exactly one of `rating` and `error` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchItem {
    pub filename: String,
    pub rating: Option<PhotoRating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processing_time_ms: u64,
}

impl DispatchItem {
    pub fn is_success(&self) -> bool {
        self.rating.is_some()
    }
}

/// Aggregate counts, timing and cost for one dispatch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_time_ms: u64,
    pub average_time_per_image_ms: f64,
    #[serde(rename = "totalCostUSD")]
    pub total_cost_usd: f64,
    #[serde(rename = "totalUserChargeUSD")]
    pub total_user_charge_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub results: Vec<DispatchItem>,
    pub summary: DispatchSummary,
}

/// Fans a multi-image request out to one provider.
pub struct Dispatcher {
    provider: Arc<dyn RatingProvider>,
    monitor: Arc<Monitor>,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn RatingProvider>, monitor: Arc<Monitor>) -> Self {
        Self { provider, monitor }
    }

    /// Rate every image in `request` concurrently.
    pub async fn dispatch(&self, request: BatchRequest) -> DispatchReport {
        let start = Instant::now();
        let total = request.images.len();
        let provider_id = self.provider.id();
        tracing::info!(provider = %provider_id, images = total, "Dispatching concurrent rating");

        let filenames: Vec<String> = request.images.iter().map(|i| i.filename.clone()).collect();
        let mut tasks = JoinSet::new();
        for (index, image) in request.images.into_iter().enumerate() {
            let provider = self.provider.clone();
            let monitor = self.monitor.clone();
            let request = RatingRequest {
                image,
                system_prompt: request.system_prompt.clone(),
                user_prompt: request.user_prompt.clone(),
            };
            tasks.spawn(async move {
                let _active = monitor.track_request(provider.id().as_str());
                let started = Instant::now();
                let outcome = provider.process_single_image(&request).await;
                (index, outcome, started.elapsed().as_millis() as u64)
            });
        }

        let mut slots: Vec<Option<DispatchItem>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome, elapsed) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // The slot stays empty and is reported below.
                    tracing::error!(provider = %provider_id, "Rating task panicked: {e}");
                    continue;
                }
            };
            let filename = filenames[index].clone();
            slots[index] = Some(match outcome {
                Ok(result) => DispatchItem {
                    filename,
                    rating: Some(result.rating),
                    cost: Some(result.cost),
                    error: None,
                    processing_time_ms: result.processing_time_ms,
                },
                Err(e) => {
                    tracing::warn!(
                        provider = %provider_id,
                        filename = %filename,
                        "Rating failed: {e}"
                    );
                    self.monitor.record_error(
                        Some(provider_id.as_str()),
                        "process-batch",
                        &format!("{filename}: {e}"),
                    );
                    DispatchItem {
                        filename,
                        rating: None,
                        cost: None,
                        error: Some(e.to_string()),
                        processing_time_ms: elapsed,
                    }
                }
            });
        }

        let results: Vec<DispatchItem> = slots
            .into_iter()
            .zip(filenames)
            .map(|(slot, filename)| {
                slot.unwrap_or_else(|| {
                    self.monitor.record_error(
                        Some(provider_id.as_str()),
                        "process-batch",
                        &format!("{filename}: rating task failed"),
                    );
                    DispatchItem {
                        filename,
                        rating: None,
                        cost: None,
                        error: Some("rating task failed".to_string()),
                        processing_time_ms: 0,
                    }
                })
            })
            .collect();

        let summary = summarize(&results, start.elapsed().as_millis() as u64);
        tracing::info!(
            provider = %provider_id,
            successful = summary.successful,
            failed = summary.failed,
            total_time_ms = summary.total_time_ms,
            "Concurrent rating finished"
        );
        DispatchReport { results, summary }
    }
}

fn summarize(results: &[DispatchItem], total_time_ms: u64) -> DispatchSummary {
    let successful = results.iter().filter(|r| r.is_success()).count();
    let (total_cost_usd, total_user_charge_usd) = results
        .iter()
        .filter_map(|r| r.cost.as_ref())
        .fold((0.0, 0.0), |(cost, charge), c| {
            (cost + c.total_cost_usd, charge + c.user_charge_usd)
        });
    DispatchSummary {
        total: results.len(),
        successful,
        failed: results.len() - successful,
        total_time_ms,
        average_time_per_image_ms: if results.is_empty() {
            0.0
        } else {
            total_time_ms as f64 / results.len() as f64
        },
        total_cost_usd,
        total_user_charge_usd,
    }
}
