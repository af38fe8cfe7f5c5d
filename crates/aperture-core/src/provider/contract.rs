//! The rating provider trait and the helpers every adapter shares.
//!
//! Shared behavior is composed rather than inherited: adapters hold a
//! [`ProviderContext`] (settings, HTTP client, retry policy, monitor) and call
//! the free functions here for MIME mapping, base64 encoding and pricing.

use crate::config::ProviderSettings;
use crate::cost::{calculate_user_charge, CostRates, ImageCostEstimate};
use crate::error::{ProviderError, ProviderResult};
use crate::monitor::Monitor;
use crate::provider::retry::RetryPolicy;
use crate::types::{
    BatchJob, BatchJobStatus, BatchRequest, BatchResults, ImageFormat, ImageInput,
    ProcessingResult, ProviderId, RatingRequest,
};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;

/// Trait that all rating providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the registry stores `Arc<dyn RatingProvider>`). Batch operations default
/// to refusing, which is the whole batch story for providers without a batch
/// API.
#[async_trait]
pub trait RatingProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Human-readable provider name (e.g., "Anthropic Claude").
    fn name(&self) -> &str;

    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Estimated provider cost of rating one image synchronously, in USD.
    fn cost_per_image(&self) -> f64;

    /// What the end user pays per image.
    fn user_charge_per_image(&self) -> f64 {
        calculate_user_charge(self.cost_per_image())
    }

    fn supports_batch(&self) -> bool {
        false
    }

    /// Estimated provider cost of one image through the batch API, `None`
    /// without batch support.
    fn batch_cost_per_image(&self) -> Option<f64> {
        None
    }

    fn batch_user_charge_per_image(&self) -> Option<f64> {
        self.batch_cost_per_image().map(calculate_user_charge)
    }

    /// Rate one image. Retries internally per the provider's retry policy.
    async fn process_single_image(&self, request: &RatingRequest)
        -> ProviderResult<ProcessingResult>;

    /// Submit a provider-hosted batch job.
    async fn submit_batch(&self, _request: &BatchRequest) -> ProviderResult<BatchJob> {
        Err(batch_unsupported(self.id()))
    }

    /// Poll a batch job and map its native state to the canonical one.
    async fn check_batch_status(&self, _job_id: &str) -> ProviderResult<BatchJobStatus> {
        Err(batch_unsupported(self.id()))
    }

    /// Fetch the ratings of a completed batch job, priced at batch rates.
    /// Per-item failures are skipped.
    async fn retrieve_batch_results(&self, _job_id: &str) -> ProviderResult<BatchResults> {
        Err(batch_unsupported(self.id()))
    }
}

/// The refusal every batch operation returns on a provider without a batch API.
pub fn batch_unsupported(id: ProviderId) -> ProviderError {
    ProviderError::BatchUnsupported {
        provider: id.to_string(),
    }
}

/// MIME type for an image format.
pub fn mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Webp => "image/webp",
        ImageFormat::Heic => "image/heic",
    }
}

/// Standard base64 encoding of raw image bytes.
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// `data:` URL for OpenAI-style `image_url` content.
pub fn data_url(image: &ImageInput) -> String {
    format!(
        "data:{};base64,{}",
        mime_type(image.format),
        encode_base64(&image.data)
    )
}

/// Key used for the image at `index` inside a provider batch.
pub fn batch_custom_id(index: usize) -> String {
    format!("image-{index}")
}

/// Inverse of [`batch_custom_id`].
pub fn parse_batch_custom_id(custom_id: &str) -> Option<usize> {
    custom_id.strip_prefix("image-")?.parse().ok()
}

/// Whether `job_id` names a single batch resource: ASCII letters, digits,
/// `_` and `-`, optionally under Google's `batches/` prefix.
pub fn is_valid_job_id(job_id: &str) -> bool {
    let bare = job_id.strip_prefix("batches/").unwrap_or(job_id);
    !bare.is_empty()
        && bare.len() <= 256
        && bare
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Refuse a job id before it is placed in a provider URL.
pub fn checked_job_id(job_id: &str) -> ProviderResult<&str> {
    if is_valid_job_id(job_id) {
        Ok(job_id)
    } else {
        Err(ProviderError::JobNotFound {
            job_id: job_id.to_string(),
        })
    }
}

/// Everything an adapter needs besides its wire format.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    /// Resolved settings; `api_key` holds the real key
    pub settings: ProviderSettings,
    pub client: reqwest::Client,
    pub retry: RetryPolicy,
    pub monitor: Arc<Monitor>,
    pub estimate: ImageCostEstimate,
    /// Fraction of the synchronous rate billed for batch jobs
    pub batch_discount: f64,
}

impl ProviderContext {
    pub fn new(settings: ProviderSettings, client: reqwest::Client) -> Self {
        Self {
            settings,
            client,
            retry: RetryPolicy::default(),
            monitor: Arc::new(Monitor::default()),
            estimate: ImageCostEstimate::default(),
            batch_discount: 0.5,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<Monitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_pricing(mut self, estimate: ImageCostEstimate, batch_discount: f64) -> Self {
        self.estimate = estimate;
        self.batch_discount = batch_discount;
        self
    }

    pub fn rates(&self) -> CostRates {
        self.settings.rates()
    }

    pub fn batch_rates(&self) -> CostRates {
        self.rates().discounted(self.batch_discount)
    }

    pub fn cost_per_image(&self) -> f64 {
        self.estimate.price(self.rates())
    }

    pub fn batch_cost_per_image(&self) -> f64 {
        self.estimate.price(self.batch_rates())
    }

    /// Join the configured base endpoint with an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.endpoint.trim_end_matches('/'), path)
    }
}
