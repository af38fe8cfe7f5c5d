//! HTTP plumbing shared by the adapters: status classification,
//! `Retry-After` parsing and body decoding into provider errors.

use crate::error::{ProviderError, ProviderResult};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 2000;

pub(crate) fn network_error(provider: &str, err: reqwest::Error) -> ProviderError {
    let message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    };
    ProviderError::Network {
        provider: provider.to_string(),
        message,
    }
}

/// Parse `Retry-After` (seconds, possibly fractional). OpenAI-style
/// `retry-after-ms` is honoured when present.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(ms) = headers
        .get("retry-after-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
    {
        return Some(ms);
    }
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Pass a successful response through, or turn it into an `Http` error.
pub(crate) async fn ensure_success(provider: &str, resp: Response) -> ProviderResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after = parse_retry_after(resp.headers());
    let mut text = resp.text().await.unwrap_or_default();
    if text.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    Err(ProviderError::Http {
        provider: provider.to_string(),
        status: status.as_u16(),
        message: text,
        retry_after,
    })
}

/// Check status and decode the JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &str,
    resp: Response,
) -> ProviderResult<T> {
    let resp = ensure_success(provider, resp).await?;
    let body = resp.text().await.map_err(|e| network_error(provider, e))?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Parse {
        provider: provider.to_string(),
        message: format!("failed to parse response: {e}"),
    })
}

/// Check status and return the raw body text (JSONL result files).
pub(crate) async fn read_text(provider: &str, resp: Response) -> ProviderResult<String> {
    let resp = ensure_success(provider, resp).await?;
    resp.text().await.map_err(|e| network_error(provider, e))
}

/// Map a 404 on a job lookup to `JobNotFound`.
pub(crate) fn job_not_found(err: ProviderError, job_id: &str) -> ProviderError {
    match err {
        ProviderError::Http { status: 404, .. } => ProviderError::JobNotFound {
            job_id: job_id.to_string(),
        },
        other => other,
    }
}
