//! Google Gemini provider using `generateContent` and `batchGenerateContent`.
//!
//! Images travel as `inlineData` parts; the rating schema is enforced through
//! `generationConfig.responseSchema`. Batch jobs use inlined requests keyed
//! by custom id, and their results come back inlined in the batch resource.
//! Job ids are exposed without the `batches/` resource prefix.

use super::contract::{
    batch_custom_id, checked_job_id, encode_base64, mime_type, ProviderContext, RatingProvider,
};
use super::http::{job_not_found, network_error, read_json};
use super::schema::gemini_rating_schema;
use super::validate::{extract_json_object, validate_rating};
use crate::cost::{CostBreakdown, TokenUsage};
use crate::error::{ProviderError, ProviderResult};
use crate::types::{
    compose_user_prompt, BatchJob, BatchJobStatus, BatchRequest, BatchResults, BatchState,
    ImageInput, PhotoRating, ProcessingResult, ProviderId, RatingRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

const PROVIDER: &str = "google";
const API_PREFIX: &str = "/v1beta";
const BATCH_PREFIX: &str = "batches/";
const BATCH_ESTIMATE_HOURS: i64 = 24;

/// Map a Gemini batch state onto the canonical batch state.
///
/// Accepts both the `JOB_STATE_*` and `BATCH_STATE_*` spellings.
pub fn map_batch_status(native: &str) -> BatchState {
    let state = native
        .strip_prefix("JOB_STATE_")
        .or_else(|| native.strip_prefix("BATCH_STATE_"))
        .unwrap_or(native);
    match state {
        "PENDING" | "QUEUED" => BatchState::Queued,
        "RUNNING" | "CANCELLING" | "PAUSED" | "UPDATING" => BatchState::Processing,
        "SUCCEEDED" | "PARTIALLY_SUCCEEDED" => BatchState::Completed,
        "FAILED" | "CANCELLED" | "EXPIRED" => BatchState::Failed,
        _ => BatchState::Queued,
    }
}

/// Google Gemini provider.
pub struct GoogleProvider {
    ctx: ProviderContext,
}

impl GoogleProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str, image: &ImageInput) -> GenerateRequest {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: system_prompt.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type(image.format).to_string(),
                            data: encode_base64(&image.data),
                        },
                    },
                    Part::Text {
                        text: compose_user_prompt(user_prompt, image),
                    },
                ],
            }],
            generation_config: json!({
                "responseMimeType": "application/json",
                "responseSchema": gemini_rating_schema(),
                "maxOutputTokens": self.ctx.settings.max_tokens,
                "temperature": 0.2,
            }),
        }
    }

    fn model_url(&self, method: &str) -> String {
        self.ctx.url(&format!(
            "{API_PREFIX}/models/{}:{method}",
            self.ctx.settings.model
        ))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("x-goog-api-key", &self.ctx.settings.api_key)
    }

    async fn fetch_batch(&self, job_id: &str) -> ProviderResult<BatchOperation> {
        let job_id = checked_job_id(job_id)?;
        let url = self.ctx.url(&format!("{API_PREFIX}/{BATCH_PREFIX}{job_id}"));
        let url = &url;
        self.ctx
            .retry
            .run(PROVIDER, &self.ctx.monitor, || async move {
                let resp = self
                    .request(self.ctx.client.get(url))
                    .send()
                    .await
                    .map_err(|e| network_error(PROVIDER, e))?;
                read_json(PROVIDER, resp).await
            })
            .await
            .map_err(|e| job_not_found(e, job_id))
    }

    fn to_status(&self, op: &BatchOperation) -> BatchJobStatus {
        let meta = op.metadata.as_ref();
        let stats = meta.and_then(|m| m.batch_stats.as_ref());
        let responses = op.inlined_responses();
        let total = stats
            .map(|s| count(&s.request_count))
            .filter(|n| *n > 0)
            .unwrap_or(responses.len());
        let failed = stats.map(|s| count(&s.failed_request_count)).unwrap_or(0);
        let succeeded = stats.map(|s| count(&s.successful_request_count)).unwrap_or(0);
        let created_at = meta
            .and_then(|m| m.create_time.as_deref())
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let status = map_batch_status(op.state());
        BatchJobStatus {
            job_id: strip_prefix(&op.name).to_string(),
            provider: ProviderId::Google,
            status,
            total_images: total,
            processed_images: succeeded + failed,
            failed_images: failed,
            created_at,
            estimated_completion: Some(created_at + chrono::Duration::hours(BATCH_ESTIMATE_HOURS)),
            results: None,
            error: match (&op.error, status) {
                (Some(e), _) => Some(e.message.clone()),
                (None, BatchState::Failed) => Some(format!("batch {}", op.state())),
                _ => None,
            },
        }
    }
}

fn strip_prefix(name: &str) -> &str {
    name.strip_prefix(BATCH_PREFIX).unwrap_or(name)
}

/// Gemini encodes int64 counters as JSON strings.
fn count(value: &Option<Value>) -> usize {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: Value,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct UsageMetadata {
    prompt_token_count: u64,
    candidates_token_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchOperation {
    name: String,
    metadata: Option<BatchMetadata>,
    state: Option<String>,
    response: Option<BatchOutput>,
    error: Option<OperationError>,
}

impl BatchOperation {
    fn state(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.state.as_deref())
            .or(self.state.as_deref())
            .unwrap_or("")
    }

    fn inlined_responses(&self) -> &[InlinedResponse] {
        self.response
            .as_ref()
            .or_else(|| self.metadata.as_ref().and_then(|m| m.output.as_ref()))
            .and_then(|o| o.inlined_responses.as_ref())
            .map(|r| r.inlined_responses.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchMetadata {
    state: Option<String>,
    create_time: Option<String>,
    batch_stats: Option<BatchStats>,
    output: Option<BatchOutput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchStats {
    request_count: Option<Value>,
    successful_request_count: Option<Value>,
    failed_request_count: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchOutput {
    inlined_responses: Option<InlinedResponses>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlinedResponses {
    #[serde(default)]
    inlined_responses: Vec<InlinedResponse>,
}

#[derive(Deserialize)]
struct InlinedResponse {
    response: Option<GenerateResponse>,
    error: Option<OperationError>,
    metadata: Option<Value>,
}

#[derive(Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

fn parse_generation(image_id: &str, resp: &GenerateResponse) -> ProviderResult<PhotoRating> {
    let text: String = resp
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(ProviderError::Parse {
            provider: PROVIDER.to_string(),
            message: "response has no candidate text".to_string(),
        });
    }
    let raw = extract_json_object(&text).map_err(|message| ProviderError::Parse {
        provider: PROVIDER.to_string(),
        message,
    })?;
    Ok(validate_rating(image_id, &raw))
}

#[async_trait]
impl RatingProvider for GoogleProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Google
    }

    fn name(&self) -> &str {
        "Google Gemini"
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
        let url = self.model_url("generateContent");
        let url = &url;
        let image_id = request.image.filename.as_str();

        let (rating, usage) = self
            .ctx
            .retry
            .run(PROVIDER, &self.ctx.monitor, || async move {
                let resp = self
                    .request(self.ctx.client.post(url))
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| network_error(PROVIDER, e))?;
                let generated: GenerateResponse = read_json(PROVIDER, resp).await?;
                let rating = parse_generation(image_id, &generated)?;
                Ok((rating, generated.usage_metadata.unwrap_or_default()))
            })
            .await?;

        Ok(ProcessingResult {
            rating,
            cost: CostBreakdown::from_usage(
                usage.prompt_token_count,
                usage.candidates_token_count,
                self.ctx.rates(),
            ),
            processing_time_ms: start.elapsed().as_millis() as u64,
            provider: ProviderId::Google,
        })
    }

    async fn submit_batch(&self, request: &BatchRequest) -> ProviderResult<BatchJob> {
        let requests: Vec<Value> = request
            .images
            .iter()
            .enumerate()
            .map(|(index, image)| {
                json!({
                    "request": self.build_request(&request.system_prompt, &request.user_prompt, image),
                    "metadata": {"key": batch_custom_id(index)},
                })
            })
            .collect();
        let body = json!({
            "batch": {
                "display_name": format!("aperture-{}", Utc::now().timestamp_millis()),
                "input_config": {"requests": {"requests": requests}},
            }
        });
        let body = &body;
        let url = self.model_url("batchGenerateContent");
        let url = &url;

        let op: BatchOperation = self
            .ctx
            .retry
            .run(PROVIDER, &self.ctx.monitor, || async move {
                let resp = self
                    .request(self.ctx.client.post(url))
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| network_error(PROVIDER, e))?;
                read_json(PROVIDER, resp).await
            })
            .await?;

        let status = self.to_status(&op);
        tracing::info!(job_id = %status.job_id, images = request.images.len(), "Gemini batch submitted");
        Ok(BatchJob {
            job_id: status.job_id,
            provider: ProviderId::Google,
            status: BatchState::Queued,
            total_images: request.images.len(),
            processed_images: 0,
            created_at: status.created_at,
            estimated_completion: status.estimated_completion,
        })
    }

    async fn check_batch_status(&self, job_id: &str) -> ProviderResult<BatchJobStatus> {
        let op = self.fetch_batch(strip_prefix(job_id)).await?;
        Ok(self.to_status(&op))
    }

    async fn retrieve_batch_results(&self, job_id: &str) -> ProviderResult<BatchResults> {
        let job_id = strip_prefix(job_id);
        let op = self.fetch_batch(job_id).await?;
        let status = map_batch_status(op.state());
        if status != BatchState::Completed {
            return Err(ProviderError::JobNotComplete {
                job_id: job_id.to_string(),
                status,
            });
        }

        let mut ratings = Vec::new();
        let mut usage = TokenUsage::default();
        for (index, item) in op.inlined_responses().iter().enumerate() {
            let key = item
                .metadata
                .as_ref()
                .and_then(|m| m.get("key"))
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| batch_custom_id(index));
            if let Some(ref error) = item.error {
                tracing::warn!(job_id, key = %key, "Batch item failed: {}", error.message);
                continue;
            }
            let Some(ref response) = item.response else {
                continue;
            };
            match parse_generation(&key, response) {
                Ok(rating) => {
                    if let Some(ref meta) = response.usage_metadata {
                        usage.add(meta.prompt_token_count, meta.candidates_token_count);
                    }
                    ratings.push(rating);
                }
                Err(e) => tracing::warn!(job_id, key = %key, "{e}"),
            }
        }
        Ok(BatchResults {
            ratings,
            cost: usage.price(self.ctx.batch_rates()),
        })
    }
}
