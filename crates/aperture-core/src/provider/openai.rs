//! OpenAI provider using the Chat Completions API and the Batch API.
//!
//! Sends the image via data URL in the user message content array and
//! enforces the rating schema with strict `json_schema` response format.
//! The Chat Completions plumbing lives in [`ChatCompletions`] so the
//! OpenAI-compatible providers in `compatible` reuse it with their own endpoint.

use super::contract::{batch_custom_id, checked_job_id, data_url, ProviderContext, RatingProvider};
use super::http::{job_not_found, network_error, read_json, read_text};
use super::schema::{json_instructions, openai_rating_schema};
use super::validate::{extract_json_object, validate_rating};
use crate::cost::{CostBreakdown, TokenUsage};
use crate::error::{ProviderError, ProviderResult};
use crate::types::{
    compose_user_prompt, BatchJob, BatchJobStatus, BatchRequest, BatchResults, BatchState,
    ImageInput, PhotoRating, ProcessingResult, ProviderId, RatingRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

const PROVIDER: &str = "openai";
const CHAT_PATH: &str = "/v1/chat/completions";
const COMPLETION_WINDOW: &str = "24h";
const BATCH_ESTIMATE_HOURS: i64 = 24;

/// Map OpenAI's batch `status` onto the canonical batch state.
pub fn map_batch_status(native: &str) -> BatchState {
    match native {
        "validating" => BatchState::Queued,
        "in_progress" | "finalizing" | "cancelling" => BatchState::Processing,
        "completed" => BatchState::Completed,
        "failed" | "expired" | "cancelled" => BatchState::Failed,
        _ => BatchState::Queued,
    }
}

/// How a chat-completions backend is told to produce the rating JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputMode {
    /// Strict `json_schema` response format (OpenAI)
    StrictSchema,
    /// `json_object` response format plus the field list in the system prompt
    JsonObject,
}

/// Chat Completions client shared by every OpenAI-compatible backend.
pub(crate) struct ChatCompletions {
    provider: ProviderId,
    pub(crate) ctx: ProviderContext,
    mode: OutputMode,
}

impl ChatCompletions {
    pub(crate) fn new(provider: ProviderId, ctx: ProviderContext, mode: OutputMode) -> Self {
        Self { provider, ctx, mode }
    }

    pub(crate) fn provider(&self) -> ProviderId {
        self.provider
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str, image: &ImageInput) -> ChatRequest {
        let (system, response_format) = match self.mode {
            OutputMode::StrictSchema => (
                system_prompt.to_string(),
                json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": "photo_rating",
                        "strict": true,
                        "schema": openai_rating_schema(),
                    }
                }),
            ),
            OutputMode::JsonObject => (
                format!("{system_prompt}\n\n{}", json_instructions()),
                json!({"type": "json_object"}),
            ),
        };

        ChatRequest {
            model: self.ctx.settings.model.clone(),
            max_tokens: self.ctx.settings.max_tokens,
            temperature: 0.2,
            response_format,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: MessageContent::Text(system),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: MessageContent::Parts(vec![
                        ChatContent::Text {
                            text: compose_user_prompt(user_prompt, image),
                        },
                        ChatContent::ImageUrl {
                            image_url: ImageUrl {
                                url: data_url(image),
                                detail: "high".to_string(),
                            },
                        },
                    ]),
                },
            ],
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header(
            "Authorization",
            format!("Bearer {}", self.ctx.settings.api_key),
        )
    }

    /// Rate one image through `POST {endpoint}/v1/chat/completions`.
    pub(crate) async fn rate(&self, request: &RatingRequest) -> ProviderResult<ProcessingResult> {
        let start = Instant::now();
        let name = self.provider.as_str();
        let body = self.build_request(&request.system_prompt, &request.user_prompt, &request.image);
        let body = &body;
        let url = self.ctx.url(CHAT_PATH);
        let url = &url;
        let image_id = request.image.filename.as_str();

        let (rating, input_tokens, output_tokens) = self
            .ctx
            .retry
            .run(name, &self.ctx.monitor, || async move {
                let resp = self
                    .authorized(self.ctx.client.post(url))
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| network_error(name, e))?;
                let chat: ChatResponse = read_json(name, resp).await?;
                let rating = parse_completion(name, image_id, &chat)?;
                let usage = chat.usage.unwrap_or_default();
                Ok((rating, usage.prompt_tokens, usage.completion_tokens))
            })
            .await?;

        Ok(ProcessingResult {
            rating,
            cost: CostBreakdown::from_usage(input_tokens, output_tokens, self.ctx.rates()),
            processing_time_ms: start.elapsed().as_millis() as u64,
            provider: self.provider,
        })
    }
}

/// OpenAI provider using the Chat Completions and Batch APIs.
pub struct OpenAiProvider {
    chat: ChatCompletions,
}

impl OpenAiProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self {
            chat: ChatCompletions::new(ProviderId::Openai, ctx, OutputMode::StrictSchema),
        }
    }

    fn ctx(&self) -> &ProviderContext {
        &self.chat.ctx
    }

    async fn get(&self, path: &str) -> ProviderResult<reqwest::Response> {
        let ctx = self.ctx();
        self.chat
            .authorized(ctx.client.get(ctx.url(path)))
            .send()
            .await
            .map_err(|e| network_error(PROVIDER, e))
    }

    async fn fetch_batch(&self, job_id: &str) -> ProviderResult<BatchObject> {
        let job_id = checked_job_id(job_id)?;
        let path = format!("/v1/batches/{job_id}");
        let path = &path;
        let ctx = self.ctx();
        ctx.retry
            .run(PROVIDER, &ctx.monitor, || async move {
                read_json(PROVIDER, self.get(path).await?).await
            })
            .await
            .map_err(|e| job_not_found(e, job_id))
    }

    async fn upload_batch_file(&self, jsonl: &str) -> ProviderResult<FileObject> {
        let ctx = self.ctx();
        ctx.retry
            .run(PROVIDER, &ctx.monitor, || async move {
                let part = Part::bytes(jsonl.as_bytes().to_vec())
                    .file_name("batch.jsonl")
                    .mime_str("application/jsonl")
                    .map_err(|e| network_error(PROVIDER, e))?;
                let form = Form::new().text("purpose", "batch").part("file", part);
                let resp = self
                    .chat
                    .authorized(ctx.client.post(ctx.url("/v1/files")))
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|e| network_error(PROVIDER, e))?;
                read_json(PROVIDER, resp).await
            })
            .await
    }

    fn to_status(&self, batch: &BatchObject) -> BatchJobStatus {
        let counts = batch.request_counts.clone().unwrap_or_default();
        let created_at = from_unix(batch.created_at);
        let status = map_batch_status(&batch.status);
        let error = (status == BatchState::Failed).then(|| {
            batch
                .errors
                .as_ref()
                .and_then(|e| e.data.iter().find_map(|d| d.message.clone()))
                .unwrap_or_else(|| format!("batch {}", batch.status))
        });
        BatchJobStatus {
            job_id: batch.id.clone(),
            provider: ProviderId::Openai,
            status,
            total_images: counts.total,
            processed_images: counts.completed + counts.failed,
            failed_images: counts.failed,
            created_at,
            estimated_completion: Some(created_at + chrono::Duration::hours(BATCH_ESTIMATE_HOURS)),
            results: None,
            error,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: Value,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ChatContent>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

#[derive(Serialize)]
struct BatchLine<'a> {
    custom_id: String,
    method: &'static str,
    url: &'static str,
    body: &'a ChatRequest,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    created_at: i64,
    request_counts: Option<RequestCounts>,
    output_file_id: Option<String>,
    errors: Option<BatchErrors>,
}

#[derive(Deserialize, Default, Clone)]
#[serde(default)]
struct RequestCounts {
    total: usize,
    completed: usize,
    failed: usize,
}

#[derive(Deserialize)]
struct BatchErrors {
    #[serde(default)]
    data: Vec<BatchErrorItem>,
}

#[derive(Deserialize)]
struct BatchErrorItem {
    message: Option<String>,
}

#[derive(Deserialize)]
struct OutputLine {
    custom_id: String,
    response: Option<OutputResponse>,
}

#[derive(Deserialize)]
struct OutputResponse {
    status_code: u16,
    body: Value,
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

fn parse_completion(provider: &str, image_id: &str, chat: &ChatResponse) -> ProviderResult<PhotoRating> {
    let text = chat
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .ok_or_else(|| ProviderError::Parse {
            provider: provider.to_string(),
            message: "empty choices array, no content generated".to_string(),
        })?;
    let raw = extract_json_object(text).map_err(|message| ProviderError::Parse {
        provider: provider.to_string(),
        message,
    })?;
    Ok(validate_rating(image_id, &raw))
}

#[async_trait]
impl RatingProvider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Openai
    }

    fn name(&self) -> &str {
        "OpenAI GPT"
    }

    fn model(&self) -> &str {
        &self.ctx().settings.model
    }

    fn cost_per_image(&self) -> f64 {
        self.ctx().cost_per_image()
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn batch_cost_per_image(&self) -> Option<f64> {
        Some(self.ctx().batch_cost_per_image())
    }

    async fn process_single_image(
        &self,
        request: &RatingRequest,
    ) -> ProviderResult<ProcessingResult> {
        self.chat.rate(request).await
    }

    async fn submit_batch(&self, request: &BatchRequest) -> ProviderResult<BatchJob> {
        let mut jsonl = String::new();
        for (index, image) in request.images.iter().enumerate() {
            let body = self
                .chat
                .build_request(&request.system_prompt, &request.user_prompt, image);
            let line = BatchLine {
                custom_id: batch_custom_id(index),
                method: "POST",
                url: CHAT_PATH,
                body: &body,
            };
            let encoded = serde_json::to_string(&line).map_err(|e| ProviderError::Parse {
                provider: PROVIDER.to_string(),
                message: format!("failed to encode batch line: {e}"),
            })?;
            jsonl.push_str(&encoded);
            jsonl.push('\n');
        }

        let file = self.upload_batch_file(&jsonl).await?;
        tracing::debug!(file_id = %file.id, "Uploaded OpenAI batch input file");

        let body = json!({
            "input_file_id": file.id,
            "endpoint": CHAT_PATH,
            "completion_window": COMPLETION_WINDOW,
        });
        let body = &body;
        let ctx = self.ctx();
        let batch: BatchObject = ctx
            .retry
            .run(PROVIDER, &ctx.monitor, || async move {
                let resp = self
                    .chat
                    .authorized(ctx.client.post(ctx.url("/v1/batches")))
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| network_error(PROVIDER, e))?;
                read_json(PROVIDER, resp).await
            })
            .await?;

        tracing::info!(job_id = %batch.id, images = request.images.len(), "OpenAI batch submitted");
        let status = self.to_status(&batch);
        Ok(BatchJob {
            job_id: batch.id,
            provider: ProviderId::Openai,
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
        let status = map_batch_status(&batch.status);
        if status != BatchState::Completed {
            return Err(ProviderError::JobNotComplete {
                job_id: job_id.to_string(),
                status,
            });
        }
        // Every request failed: the batch completes with only an error file.
        let Some(output_file_id) = batch.output_file_id else {
            tracing::warn!(job_id, "OpenAI batch completed without an output file");
            return Ok(BatchResults::default());
        };

        let path = format!("/v1/files/{output_file_id}/content");
        let path = &path;
        let ctx = self.ctx();
        let body = ctx
            .retry
            .run(PROVIDER, &ctx.monitor, || async move {
                read_text(PROVIDER, self.get(path).await?).await
            })
            .await?;

        let mut ratings = Vec::new();
        let mut usage = TokenUsage::default();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let item: OutputLine = match serde_json::from_str(line) {
                Ok(item) => item,
                Err(e) => {
                    tracing::warn!(job_id, "Skipping malformed OpenAI output line: {e}");
                    continue;
                }
            };
            let Some(response) = item.response.filter(|r| r.status_code == 200) else {
                tracing::warn!(job_id, custom_id = %item.custom_id, "Batch item failed");
                continue;
            };
            let parsed = serde_json::from_value::<ChatResponse>(response.body)
                .map_err(|e| ProviderError::Parse {
                    provider: PROVIDER.to_string(),
                    message: e.to_string(),
                })
                .and_then(|chat| {
                    let rating = parse_completion(PROVIDER, &item.custom_id, &chat)?;
                    Ok((rating, chat.usage.unwrap_or_default()))
                });
            match parsed {
                Ok((rating, chat_usage)) => {
                    usage.add(chat_usage.prompt_tokens, chat_usage.completion_tokens);
                    ratings.push(rating);
                }
                Err(e) => tracing::warn!(job_id, custom_id = %item.custom_id, "{e}"),
            }
        }
        Ok(BatchResults {
            ratings,
            cost: usage.price(ctx.batch_rates()),
        })
    }
}
