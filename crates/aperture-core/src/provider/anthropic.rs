//! Anthropic provider using the Messages API and Message Batches API.
//!
//! Sends image + prompt as base64 image content blocks. Output format is
//! prompt-engineered (the JSON contract is appended to the system prompt) and
//! normalized by the validator. Batch results arrive as JSONL from the
//! batch's `results_url`.

use super::contract::{batch_custom_id, checked_job_id, ProviderContext, RatingProvider};
use super::http::{job_not_found, network_error, read_json, read_text};
use super::schema::json_instructions;
use super::validate::{extract_json_object, validate_rating};
use crate::cost::{CostBreakdown, TokenUsage};
use crate::error::{ProviderError, ProviderResult};
use crate::provider::contract::{encode_base64, mime_type};
use crate::types::{
    compose_user_prompt, BatchJob, BatchJobStatus, BatchRequest, BatchResults, BatchState,
    ImageInput, PhotoRating, ProcessingResult, ProviderId, RatingRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
const BATCH_BETA: &str = "message-batches-2024-09-24";
/// Anthropic reports most batches finish within an hour.
const BATCH_ESTIMATE_HOURS: i64 = 1;

/// Map Anthropic's `processing_status` onto the canonical batch state.
pub fn map_batch_status(native: &str) -> BatchState {
    match native {
        "in_progress" | "canceling" => BatchState::Processing,
        "ended" => BatchState::Completed,
        "canceled" | "expired" => BatchState::Failed,
        _ => BatchState::Queued,
    }
}

/// Anthropic provider using the Messages API.
pub struct AnthropicProvider {
    ctx: ProviderContext,
}

impl AnthropicProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str, image: &ImageInput) -> MessagesRequest {
        MessagesRequest {
            model: self.ctx.settings.model.clone(),
            max_tokens: self.ctx.settings.max_tokens,
            system: format!("{system_prompt}\n\n{}", json_instructions()),
            temperature: Some(0.2),
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64".to_string(),
                            media_type: mime_type(image.format).to_string(),
                            data: encode_base64(&image.data),
                        },
                    },
                    ContentBlock::Text {
                        text: compose_user_prompt(user_prompt, image),
                    },
                ],
            }],
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.ctx
            .client
            .post(self.ctx.url(path))
            .header("x-api-key", &self.ctx.settings.api_key)
            .header("anthropic-version", API_VERSION)
    }

    fn get_url(&self, url: &str) -> reqwest::RequestBuilder {
        self.ctx
            .client
            .get(url)
            .header("x-api-key", &self.ctx.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .header("anthropic-beta", BATCH_BETA)
    }

    async fn send_message(&self, body: &MessagesRequest) -> ProviderResult<MessagesResponse> {
        let resp = self
            .post("/v1/messages")
            .json(body)
            .send()
            .await
            .map_err(|e| network_error(PROVIDER, e))?;
        read_json(PROVIDER, resp).await
    }

    async fn fetch_batch(&self, job_id: &str) -> ProviderResult<BatchResponse> {
        let job_id = checked_job_id(job_id)?;
        let url = self.ctx.url(&format!("/v1/messages/batches/{job_id}"));
        let url = &url;
        self.ctx
            .retry
            .run(PROVIDER, &self.ctx.monitor, || async move {
                let resp = self
                    .get_url(url)
                    .send()
                    .await
                    .map_err(|e| network_error(PROVIDER, e))?;
                read_json(PROVIDER, resp).await
            })
            .await
            .map_err(|e| job_not_found(e, job_id))
    }

    fn to_status(&self, batch: &BatchResponse) -> BatchJobStatus {
        let counts = &batch.request_counts;
        let failed = counts.errored + counts.canceled + counts.expired;
        let created_at = parse_time(batch.created_at.as_deref());
        let status = map_batch_status(&batch.processing_status);
        BatchJobStatus {
            job_id: batch.id.clone(),
            provider: ProviderId::Anthropic,
            status,
            total_images: counts.total(),
            processed_images: counts.succeeded + failed,
            failed_images: failed,
            created_at,
            estimated_completion: Some(created_at + chrono::Duration::hours(BATCH_ESTIMATE_HOURS)),
            results: None,
            error: (status == BatchState::Failed)
                .then(|| format!("batch {}", batch.processing_status)),
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Serialize)]
struct CreateBatchRequest {
    requests: Vec<BatchItem>,
}

#[derive(Serialize)]
struct BatchItem {
    custom_id: String,
    params: MessagesRequest,
}

// --- Response types ---

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
struct BatchResponse {
    id: String,
    processing_status: String,
    #[serde(default)]
    request_counts: RequestCounts,
    created_at: Option<String>,
    results_url: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RequestCounts {
    processing: usize,
    succeeded: usize,
    errored: usize,
    canceled: usize,
    expired: usize,
}

impl RequestCounts {
    fn total(&self) -> usize {
        self.processing + self.succeeded + self.errored + self.canceled + self.expired
    }
}

#[derive(Deserialize)]
struct ResultLine {
    custom_id: String,
    result: ResultBody,
}

#[derive(Deserialize)]
struct ResultBody {
    #[serde(rename = "type")]
    result_type: String,
    message: Option<MessagesResponse>,
}

fn parse_time(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Validated rating and usage from a Messages API response.
fn parse_message(image_id: &str, message: &MessagesResponse) -> ProviderResult<PhotoRating> {
    let text = message
        .content
        .iter()
        .filter_map(|c| c.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    let raw = extract_json_object(&text).map_err(|message| ProviderError::Parse {
        provider: PROVIDER.to_string(),
        message,
    })?;
    Ok(validate_rating(image_id, &raw))
}

#[async_trait]
impl RatingProvider for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn name(&self) -> &str {
        "Anthropic Claude"
    }

    fn model(&self) -> &str {
        &self.ctx.settings.model
    }

    fn cost_per_image(&self) -> f64 {
        self.ctx.cost_per_image()
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn batch_cost_per_image(&self) -> Option<f64> {
        Some(self.ctx.batch_cost_per_image())
    }

    async fn process_single_image(
        &self,
        request: &RatingRequest,
    ) -> ProviderResult<ProcessingResult> {
        let start = Instant::now();
        let body = self.build_request(&request.system_prompt, &request.user_prompt, &request.image);
        let body = &body;
        let image_id = request.image.filename.as_str();

        let (rating, input_tokens, output_tokens) = self
            .ctx
            .retry
            .run(PROVIDER, &self.ctx.monitor, || async move {
                let message = self.send_message(body).await?;
                let rating = parse_message(image_id, &message)?;
                Ok((rating, message.usage.input_tokens, message.usage.output_tokens))
            })
            .await?;

        Ok(ProcessingResult {
            rating,
            cost: CostBreakdown::from_usage(input_tokens, output_tokens, self.ctx.rates()),
            processing_time_ms: start.elapsed().as_millis() as u64,
            provider: ProviderId::Anthropic,
        })
    }

    async fn submit_batch(&self, request: &BatchRequest) -> ProviderResult<BatchJob> {
        let body = CreateBatchRequest {
            requests: request
                .images
                .iter()
                .enumerate()
                .map(|(index, image)| BatchItem {
                    custom_id: batch_custom_id(index),
                    params: self.build_request(&request.system_prompt, &request.user_prompt, image),
                })
                .collect(),
        };
        let body = &body;

        let batch: BatchResponse = self
            .ctx
            .retry
            .run(PROVIDER, &self.ctx.monitor, || async move {
                let resp = self
                    .post("/v1/messages/batches")
                    .header("anthropic-beta", BATCH_BETA)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| network_error(PROVIDER, e))?;
                read_json(PROVIDER, resp).await
            })
            .await?;

        tracing::info!(job_id = %batch.id, images = request.images.len(), "Anthropic batch submitted");
        let status = self.to_status(&batch);
        Ok(BatchJob {
            job_id: status.job_id,
            provider: ProviderId::Anthropic,
            status: BatchState::Queued,
            total_images: request.images.len(),
            processed_images: 0,
            created_at: status.created_at,
            estimated_completion: status.estimated_completion,
        })
    }

    async fn check_batch_status(&self, job_id: &str) -> ProviderResult<BatchJobStatus> {
        let batch = self.fetch_batch(job_id).await?;
        Ok(self.to_status(&batch))
    }

    async fn retrieve_batch_results(&self, job_id: &str) -> ProviderResult<BatchResults> {
        let batch = self.fetch_batch(job_id).await?;
        let status = map_batch_status(&batch.processing_status);
        if status != BatchState::Completed {
            return Err(ProviderError::JobNotComplete {
                job_id: job_id.to_string(),
                status,
            });
        }
        let url = batch.results_url.ok_or_else(|| ProviderError::Parse {
            provider: PROVIDER.to_string(),
            message: format!("batch {job_id} ended without a results_url"),
        })?;
        let url = &url;

        let body = self
            .ctx
            .retry
            .run(PROVIDER, &self.ctx.monitor, || async move {
                let resp = self
                    .get_url(url)
                    .send()
                    .await
                    .map_err(|e| network_error(PROVIDER, e))?;
                read_text(PROVIDER, resp).await
            })
            .await?;

        let mut ratings = Vec::new();
        let mut usage = TokenUsage::default();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let item: ResultLine = match serde_json::from_str(line) {
                Ok(item) => item,
                Err(e) => {
                    tracing::warn!(job_id, "Skipping malformed Anthropic result line: {e}");
                    continue;
                }
            };
            match (item.result.result_type.as_str(), item.result.message) {
                ("succeeded", Some(message)) => match parse_message(&item.custom_id, &message) {
                    Ok(rating) => {
                        usage.add(message.usage.input_tokens, message.usage.output_tokens);
                        ratings.push(rating);
                    }
                    Err(e) => tracing::warn!(job_id, custom_id = %item.custom_id, "{e}"),
                },
                (kind, _) => {
                    tracing::warn!(job_id, custom_id = %item.custom_id, "Batch item {kind}")
                }
            }
        }
        Ok(BatchResults {
            ratings,
            cost: usage.price(self.ctx.batch_rates()),
        })
    }
}
