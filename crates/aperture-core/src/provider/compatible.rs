//! OpenAI-compatible providers without a batch API: xAI Grok and Groq.
//!
//! Both speak the Chat Completions format, so one adapter drives the shared
//! chat client in `json_object` mode against each provider's endpoint.

use super::contract::{ProviderContext, RatingProvider};
use super::openai::{ChatCompletions, OutputMode};
use crate::error::ProviderResult;
use crate::types::{ProcessingResult, ProviderId, RatingRequest};
use async_trait::async_trait;

/// A Chat Completions provider that rates synchronously only.
pub struct CompatibleProvider {
    name: &'static str,
    chat: ChatCompletions,
}

impl CompatibleProvider {
    pub fn grok(ctx: ProviderContext) -> Self {
        Self::new(ProviderId::Grok, "xAI Grok", ctx)
    }

    pub fn groq(ctx: ProviderContext) -> Self {
        Self::new(ProviderId::Groq, "Groq", ctx)
    }

    fn new(id: ProviderId, name: &'static str, ctx: ProviderContext) -> Self {
        Self {
            name,
            chat: ChatCompletions::new(id, ctx, OutputMode::JsonObject),
        }
    }
}

#[async_trait]
impl RatingProvider for CompatibleProvider {
    fn id(&self) -> ProviderId {
        self.chat.provider()
    }

    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        &self.chat.ctx.settings.model
    }

    fn cost_per_image(&self) -> f64 {
        self.chat.ctx.cost_per_image()
    }

    async fn process_single_image(
        &self,
        request: &RatingRequest,
    ) -> ProviderResult<ProcessingResult> {
        self.chat.rate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::test_support::{
        rating_json, sample_image, sample_request, spawn_mock, test_context,
    };
    use crate::types::BatchRequest;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn chat_mock(expected_model: &'static str) -> String {
        spawn_mock(move |_| {
            Router::new().route(
                "/v1/chat/completions",
                post(move |Json(body): Json<Value>| async move {
                    assert_eq!(body["model"], expected_model);
                    assert_eq!(body["response_format"]["type"], "json_object");
                    let system = body["messages"][0]["content"].as_str().unwrap();
                    assert!(system.contains("star_rating"));
                    Json(json!({
                        "choices": [{"message": {"content": rating_json().to_string()}}],
                        "usage": {"prompt_tokens": 900, "completion_tokens": 200}
                    }))
                }),
            )
        })
        .await
    }

    #[tokio::test]
    async fn test_grok_rates_through_chat_completions() {
        let base = chat_mock("grok-2-vision-1212").await;
        let provider = CompatibleProvider::grok(test_context(ProviderId::Grok, &base));
        assert_eq!(provider.id(), ProviderId::Grok);
        assert_eq!(provider.name(), "xAI Grok");

        let result = provider
            .process_single_image(&sample_request("dog.jpg"))
            .await
            .unwrap();
        assert_eq!(result.provider, ProviderId::Grok);
        assert_eq!(result.rating.star_rating, 4);
    }

    #[tokio::test]
    async fn test_groq_prices_its_own_rates() {
        let base = chat_mock("meta-llama/llama-4-scout-17b-16e-instruct").await;
        let provider = CompatibleProvider::groq(test_context(ProviderId::Groq, &base));

        let result = provider
            .process_single_image(&sample_request("cat.jpg"))
            .await
            .unwrap();
        assert_eq!(result.provider, ProviderId::Groq);
        let expected = (900.0 * 0.11 + 200.0 * 0.34) / 1_000_000.0;
        assert!((result.cost.total_cost_usd - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_batch_is_refused() {
        for provider in [
            CompatibleProvider::grok(test_context(ProviderId::Grok, "http://127.0.0.1:9")),
            CompatibleProvider::groq(test_context(ProviderId::Groq, "http://127.0.0.1:9")),
        ] {
            assert!(!provider.supports_batch());
            assert!(provider.batch_cost_per_image().is_none());

            let request = BatchRequest {
                images: vec![sample_image("a.jpg")],
                system_prompt: String::new(),
                user_prompt: String::new(),
            };
            let err = provider.submit_batch(&request).await.unwrap_err();
            assert!(matches!(err, ProviderError::BatchUnsupported { .. }));
            assert!(err.to_string().contains("use concurrent processing instead"));
            assert!(provider.check_batch_status("job").await.is_err());
            assert!(provider.retrieve_batch_results("job").await.is_err());
        }
    }
}
