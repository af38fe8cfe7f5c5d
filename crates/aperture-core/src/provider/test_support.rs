//! Fixtures for adapter wire tests: an in-process axum server standing in for
//! a provider API, and a context with a fast retry policy pointed at it.

use crate::config::ProviderSettings;
use crate::provider::contract::ProviderContext;
use crate::provider::retry::RetryPolicy;
use crate::types::{ImageFormat, ImageInput, ProviderId, RatingRequest};
use axum::Router;
use serde_json::{json, Value};
use std::time::Duration;

/// Bind an ephemeral port, build the router with the server's own base URL
/// (for endpoints that return absolute links), and serve it in the background.
pub(crate) async fn spawn_mock<F>(build: F) -> String
where
    F: FnOnce(String) -> Router,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let router = build(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base
}

pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_secs(2),
        max_retry_time: Duration::from_secs(10),
        rate_limit_default_delay: Duration::from_millis(20),
    }
}

pub(crate) fn test_context(id: ProviderId, endpoint: &str) -> ProviderContext {
    let mut settings = ProviderSettings::defaults(id);
    settings.api_key = "test-key".to_string();
    settings.endpoint = endpoint.to_string();
    ProviderContext::new(settings, reqwest::Client::new()).with_retry(fast_retry())
}

pub(crate) fn sample_image(name: &str) -> ImageInput {
    ImageInput::new(vec![0xFF, 0xD8, 0xFF, 0xE0], ImageFormat::Jpeg, name)
}

pub(crate) fn sample_request(name: &str) -> RatingRequest {
    RatingRequest {
        image: sample_image(name),
        system_prompt: "You are a photo editor.".to_string(),
        user_prompt: "Rate this photo.".to_string(),
    }
}

/// A well-formed rating payload as a model would return it.
pub(crate) fn rating_json() -> Value {
    json!({
        "star_rating": 4,
        "color_label": "green",
        "keep_reject": "keep",
        "tags": ["portrait", "golden hour"],
        "description": "Warm backlit portrait.",
        "technical_quality": {
            "sharpness_score": 820, "exposure_score": 760, "composition_score": 700,
            "color_score": 810, "overall_score": 780,
            "sharpness": 0.82, "exposure": 0.76, "composition": 0.7,
            "color": 0.81, "overall": 0.78, "in_focus": true
        },
        "subject_analysis": {
            "primary_subject": "woman", "emotion": "joy",
            "expression_score": 900, "pose_score": 650, "engagement_score": 880,
            "prominence_score": 840,
            "expression": 0.9, "pose": 0.65, "engagement": 0.88, "prominence": 0.84,
            "eyes_open": true, "eye_contact": true
        }
    })
}
