//! HTTP surface tests: the real router driven with `oneshot`, backed by mock
//! providers.

use aperture::{build_router, AppState};
use aperture_core::cost::CostRates;
use aperture_core::provider::validate_rating;
use aperture_core::{
    BatchJob, BatchJobStatus, BatchRequest, BatchResults, BatchState, CostBreakdown, Monitor,
    ProcessingResult, ProviderError, ProviderId, ProviderRegistry, ProviderResult,
    RatingProvider, RatingRequest,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const JOB_ID: &str = "mock-job-1";

/// Mock provider: filenames starting with `fail` error out with a 500, and
/// the batch job's state is whatever the test sets.
struct MockProvider {
    id: ProviderId,
    batch: bool,
    batch_state: Arc<Mutex<BatchState>>,
}

impl MockProvider {
    fn new(id: ProviderId, batch: bool) -> Self {
        Self {
            id,
            batch,
            batch_state: Arc::new(Mutex::new(BatchState::Processing)),
        }
    }

    fn status(&self) -> BatchState {
        *self.batch_state.lock().unwrap()
    }
}

#[async_trait]
impl RatingProvider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn name(&self) -> &str {
        "Mock"
    }

    fn model(&self) -> &str {
        "mock-vision-1"
    }

    fn cost_per_image(&self) -> f64 {
        0.01
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }

    fn batch_cost_per_image(&self) -> Option<f64> {
        self.batch.then_some(0.005)
    }

    async fn process_single_image(
        &self,
        request: &RatingRequest,
    ) -> ProviderResult<ProcessingResult> {
        if request.image.filename.starts_with("fail") {
            return Err(ProviderError::Http {
                provider: self.id.to_string(),
                status: 500,
                message: "upstream exploded".to_string(),
                retry_after: None,
            });
        }
        Ok(ProcessingResult {
            rating: validate_rating(&request.image.filename, &json!({"star_rating": 4.6})),
            cost: CostBreakdown::from_usage(1000, 500, CostRates::new(3.0, 15.0)),
            processing_time_ms: 12,
            provider: self.id,
        })
    }

    async fn submit_batch(&self, request: &BatchRequest) -> ProviderResult<BatchJob> {
        Ok(BatchJob {
            job_id: JOB_ID.to_string(),
            provider: self.id,
            status: BatchState::Queued,
            total_images: request.images.len(),
            processed_images: 0,
            created_at: Utc::now(),
            estimated_completion: None,
        })
    }

    async fn check_batch_status(&self, job_id: &str) -> ProviderResult<BatchJobStatus> {
        if job_id != JOB_ID {
            return Err(ProviderError::JobNotFound {
                job_id: job_id.to_string(),
            });
        }
        Ok(BatchJobStatus {
            job_id: job_id.to_string(),
            provider: self.id,
            status: self.status(),
            total_images: 2,
            processed_images: 1,
            failed_images: 0,
            created_at: Utc::now(),
            estimated_completion: None,
            results: None,
            error: None,
        })
    }

    async fn retrieve_batch_results(&self, job_id: &str) -> ProviderResult<BatchResults> {
        let status = self.status();
        if status != BatchState::Completed {
            return Err(ProviderError::JobNotComplete {
                job_id: job_id.to_string(),
                status,
            });
        }
        Ok(BatchResults {
            ratings: vec![
                validate_rating("image-0", &json!({"star_rating": 5})),
                validate_rating("image-1", &json!({"star_rating": 1})),
            ],
            cost: CostBreakdown::from_usage(2000, 400, CostRates::new(1.5, 7.5)),
        })
    }
}

struct TestApp {
    state: AppState,
    batch_state: Arc<Mutex<BatchState>>,
}

impl TestApp {
    /// Anthropic (batch-capable) and Groq (no batch) are configured.
    fn new() -> Self {
        let anthropic = MockProvider::new(ProviderId::Anthropic, true);
        let batch_state = anthropic.batch_state.clone();
        let registry = ProviderRegistry::from_providers(vec![
            Arc::new(anthropic),
            Arc::new(MockProvider::new(ProviderId::Groq, false)),
        ]);
        Self {
            state: AppState::new(registry, Arc::new(Monitor::default())),
            batch_state,
        }
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_raw(uri, body.to_string()).await
    }

    async fn post_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

fn image(filename: &str) -> Value {
    json!({
        "data": base64::engine::general_purpose::STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0]),
        "format": "jpeg",
        "filename": filename,
    })
}

fn single_body(provider: &str, filename: &str) -> Value {
    json!({
        "provider": provider,
        "image": image(filename),
        "systemPrompt": "You are a photo editor.",
        "userPrompt": "Rate this photo.",
    })
}

fn batch_body(provider: &str, filenames: &[&str], use_batch_api: bool) -> Value {
    json!({
        "provider": provider,
        "images": filenames.iter().map(|f| image(f)).collect::<Vec<_>>(),
        "systemPrompt": "You are a photo editor.",
        "userPrompt": "Rate these photos.",
        "useBatchAPI": use_batch_api,
    })
}

#[tokio::test]
async fn test_health_reports_version_and_jobs() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], aperture_core::VERSION);
    assert_eq!(body["activeBatchJobs"], 0);
    assert!(body["uptimeSeconds"].is_u64());
}

#[tokio::test]
async fn test_providers_listing() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/ai/providers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["markup"], "2x");
    let providers = body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0]["id"], "anthropic");
    assert_eq!(providers[0]["supportsBatch"], true);
    assert_eq!(providers[0]["costPerImage"], 0.01);
    assert_eq!(providers[0]["userChargePerImage"], 0.02);
    assert_eq!(providers[0]["batchCostPerImage"], 0.005);
    assert_eq!(providers[0]["batchUserChargePerImage"], 0.01);
    assert_eq!(providers[1]["id"], "groq");
    assert_eq!(providers[1]["supportsBatch"], false);
    assert!(providers[1].get("batchCostPerImage").is_none());
}

#[tokio::test]
async fn test_process_single_returns_rating_and_cost() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/api/ai/process-single", single_body("claude", "sunset.jpg"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "anthropic");
    assert_eq!(body["rating"]["imageId"], "sunset.jpg");
    assert_eq!(body["rating"]["starRating"], 5);
    assert_eq!(body["processingTimeMs"], 12);
    let total = body["cost"]["totalCostUSD"].as_f64().unwrap();
    let charge = body["cost"]["userChargeUSD"].as_f64().unwrap();
    assert!((charge - 2.0 * total).abs() < 1e-12);
}

#[tokio::test]
async fn test_process_single_validation_errors() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/ai/process-single", single_body("mystery", "a.jpg"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");
    assert!(body["message"].as_str().unwrap().contains("Unknown provider"));

    let mut missing_prompt = single_body("anthropic", "a.jpg");
    missing_prompt.as_object_mut().unwrap().remove("userPrompt");
    let (status, _) = app.post("/api/ai/process-single", missing_prompt).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut no_data = single_body("anthropic", "a.jpg");
    no_data["image"].as_object_mut().unwrap().remove("data");
    let (status, body) = app.post("/api/ai/process-single", no_data).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("image.data"));

    let (status, _) = app
        .post_raw("/api/ai/process-single", "{not json".to_string())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unconfigured_provider_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/api/ai/process-single", single_body("openai", "a.jpg"))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("openai"));
}

#[tokio::test]
async fn test_processing_failure_is_500_and_logged() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/api/ai/process-single", single_body("groq", "fail.jpg"))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Processing failed");
    assert!(body["message"].as_str().unwrap().contains("upstream exploded"));

    let (_, monitor) = app.get("/api/ai/monitor").await;
    let errors = monitor["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["provider"], "groq");
    assert_eq!(errors[0]["operation"], "process-single");
    assert_eq!(monitor["activeRequests"]["groq"], 0);
}

#[tokio::test]
async fn test_concurrent_batch_reports_partial_success() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/ai/process-batch",
            batch_body("groq", &["a.jpg", "fail-b.jpg", "c.jpg"], false),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["filename"], "a.jpg");
    assert_eq!(results[1]["filename"], "fail-b.jpg");
    assert!(results[1]["rating"].is_null());
    assert!(results[1]["error"].is_string());
    assert_eq!(results[2]["rating"]["imageId"], "c.jpg");

    let summary = &body["summary"];
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["successful"], 2);
    assert_eq!(summary["failed"], 1);
    assert!(summary["totalTimeMs"].is_u64());
    assert!(summary["averageTimePerImageMs"].is_number());
    let cost = summary["totalCostUSD"].as_f64().unwrap();
    let charge = summary["totalUserChargeUSD"].as_f64().unwrap();
    assert!((charge - 2.0 * cost).abs() < 1e-12);
}

#[tokio::test]
async fn test_batch_request_validation() {
    let app = TestApp::new();

    let (status, _) = app
        .post("/api/ai/process-batch", batch_body("anthropic", &[], false))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/api/ai/process-batch", batch_body("groq", &["a.jpg"], true))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("batch API"));
}

#[tokio::test]
async fn test_batch_lifecycle_through_the_gateway() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/ai/process-batch",
            batch_body("anthropic", &["first.jpg", "second.jpg"], true),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobId"], JOB_ID);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["totalImages"], 2);
    assert!(body["message"].as_str().unwrap().contains("batch-status"));
    let estimate = body["estimatedCostUSD"].as_f64().unwrap();
    assert!((estimate - 0.01).abs() < 1e-12);
    let charge = body["estimatedUserChargeUSD"].as_f64().unwrap();
    assert!((charge - 0.02).abs() < 1e-12);

    let (_, jobs) = app.get("/api/ai/batch-jobs").await;
    assert_eq!(jobs["total"], 1);
    assert_eq!(jobs["jobs"][0]["filenames"], json!(["first.jpg", "second.jpg"]));

    let uri = format!("/api/ai/batch-status/{JOB_ID}?provider=anthropic");
    let (status, body) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");

    let results_uri = format!("/api/ai/batch-results/{JOB_ID}?provider=anthropic");
    let (status, body) = app.get(&results_uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("not complete"));

    *app.batch_state.lock().unwrap() = BatchState::Completed;
    let (status, body) = app.get(&results_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobId"], JOB_ID);
    assert_eq!(body["totalResults"], 2);
    assert_eq!(body["results"][0]["imageId"], "first.jpg");
    assert_eq!(body["results"][1]["imageId"], "second.jpg");
    assert_eq!(body["cost"]["inputTokens"], 2000);
    assert_eq!(body["cost"]["outputTokens"], 400);
    let total = body["cost"]["totalCostUSD"].as_f64().unwrap();
    assert!((total - 0.006).abs() < 1e-12);
    let charge = body["cost"]["userChargeUSD"].as_f64().unwrap();
    assert!((charge - 0.012).abs() < 1e-12);

    let (_, jobs) = app.get("/api/ai/batch-jobs").await;
    assert_eq!(jobs["total"], 0);
}

#[tokio::test]
async fn test_failed_batch_poll_prunes_job() {
    let app = TestApp::new();
    app.post(
        "/api/ai/process-batch",
        batch_body("anthropic", &["a.jpg"], true),
    )
    .await;
    let (_, health) = app.get("/health").await;
    assert_eq!(health["activeBatchJobs"], 1);

    *app.batch_state.lock().unwrap() = BatchState::Failed;
    let (status, body) = app
        .get(&format!("/api/ai/batch-status/{JOB_ID}?provider=anthropic"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");

    let (_, jobs) = app.get("/api/ai/batch-jobs").await;
    assert_eq!(jobs["total"], 0);
}

#[tokio::test]
async fn test_batch_status_errors() {
    let app = TestApp::new();

    let (status, _) = app.get(&format!("/api/ai/batch-status/{JOB_ID}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .get(&format!("/api/ai/batch-status/{JOB_ID}?provider=groq"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("batch API"));

    let (status, body) = app
        .get("/api/ai/batch-status/nope?provider=anthropic")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_path_traversal_job_ids_are_rejected() {
    let app = TestApp::new();

    for uri in [
        "/api/ai/batch-status/..%2Ffiles%2Fx?provider=anthropic",
        "/api/ai/batch-results/..%2F..%2Fv1%2Ffiles?provider=anthropic",
        "/api/ai/batch-status/abc%3Fbeta%3Dtrue?provider=anthropic",
    ] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Invalid batch job id"));
    }

    let (_, monitor) = app.get("/api/ai/monitor").await;
    assert!(monitor["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/ai/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("/api/ai/nothing-here"));
}
