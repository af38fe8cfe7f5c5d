//! Retry engine for transient provider failures.
//!
//! Every adapter routes its outbound calls through [`RetryPolicy::run`], so
//! all five providers share one backoff algorithm: exponential backoff with a
//! provider-declared `Retry-After` override, bounded by both an attempt count
//! and a wall-clock ceiling (whichever trips first).

use crate::config::RetryConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::monitor::Monitor;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Determine whether a provider error is worth retrying.
///
/// Retryable: network failures and timeouts, unparseable 2xx bodies, rate
/// limits (429), request timeouts (408), server errors (5xx).
/// Non-retryable: auth failures, bad requests, capability errors.
pub fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::Network { .. } | ProviderError::Parse { .. } => true,
        ProviderError::Http { status, .. } => {
            *status == 408 || *status == 429 || (500..=599).contains(status)
        }
        _ => false,
    }
}

/// Backoff and ceiling parameters shared by every adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts before giving up (the first call counts)
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Wall-clock ceiling across all attempts
    pub max_retry_time: Duration,
    /// Delay for the first 429 that carries no `Retry-After`
    pub rate_limit_default_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            max_retry_time: Duration::from_millis(config.max_retry_time_ms),
            rate_limit_default_delay: Duration::from_millis(config.rate_limit_default_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds, fails terminally, or the policy's
    /// bounds are exhausted. The last error is returned on exhaustion.
    ///
    /// Rate-limit events are recorded in `monitor` as they happen.
    pub async fn run<T, F, Fut>(
        &self,
        provider: &str,
        monitor: &Monitor,
        mut operation: F,
    ) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;
        let mut backoff = self.initial_backoff;
        let mut seen_rate_limit = false;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retryable(&err) {
                return Err(err);
            }

            attempt += 1;
            let elapsed = start.elapsed();
            if elapsed >= self.max_retry_time || attempt >= self.max_retries {
                tracing::warn!(
                    provider,
                    attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Giving up after retries: {err}"
                );
                return Err(err);
            }

            if let Some(hint) = err.retry_after() {
                backoff = hint;
            } else if err.is_rate_limited() && !seen_rate_limit {
                backoff = self.rate_limit_default_delay;
            }
            backoff = backoff.min(self.max_backoff);

            if err.is_rate_limited() {
                seen_rate_limit = true;
                monitor.record_rate_limit(provider, attempt, err.retry_after(), backoff);
                tracing::warn!(
                    provider,
                    attempt,
                    delay_ms = backoff.as_millis() as u64,
                    "Rate limited, backing off"
                );
            } else {
                tracing::debug!(
                    provider,
                    attempt,
                    delay_ms = backoff.as_millis() as u64,
                    "Retrying after transient error: {err}"
                );
            }

            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2).min(self.max_backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn http_error(status: u16, retry_after: Option<Duration>) -> ProviderError {
        ProviderError::Http {
            provider: "mock".to_string(),
            status,
            message: format!("status {status}"),
            retry_after,
        }
    }

    fn policy(max_retries: u32, max_retry_time_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(60_000),
            max_retry_time: Duration::from_millis(max_retry_time_ms),
            rate_limit_default_delay: Duration::from_millis(2000),
        }
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        assert!(is_retryable(&http_error(429, None)));
    }

    #[test]
    fn test_server_error_is_retryable() {
        assert!(is_retryable(&http_error(503, None)));
        assert!(is_retryable(&http_error(408, None)));
    }

    #[test]
    fn test_auth_error_not_retryable() {
        assert!(!is_retryable(&http_error(401, None)));
        assert!(!is_retryable(&http_error(400, None)));
    }

    #[test]
    fn test_network_and_parse_errors_retryable() {
        assert!(is_retryable(&ProviderError::Network {
            provider: "mock".to_string(),
            message: "connection refused".to_string(),
        }));
        assert!(is_retryable(&ProviderError::Parse {
            provider: "mock".to_string(),
            message: "invalid JSON".to_string(),
        }));
    }

    #[test]
    fn test_capability_errors_not_retryable() {
        assert!(!is_retryable(&ProviderError::BatchUnsupported {
            provider: "groq".to_string(),
        }));
        assert!(!is_retryable(&ProviderError::JobNotFound {
            job_id: "x".to_string(),
        }));
    }

    #[test]
    fn test_default_policy_matches_config_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_retries, 1000);
        assert_eq!(p.initial_backoff, Duration::from_secs(1));
        assert_eq!(p.max_backoff, Duration::from_secs(60));
        assert_eq!(p.max_retry_time, Duration::from_secs(6 * 60 * 60));
        assert_eq!(p.rate_limit_default_delay, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_stops_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = Monitor::default();
        let counter = calls.clone();
        let result: ProviderResult<()> = policy(3, 5000)
            .run("mock", &monitor, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(http_error(500, None)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_stops_at_time_ceiling() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = Monitor::default();
        let counter = calls.clone();
        let start = Instant::now();
        let result: ProviderResult<()> = policy(1000, 5000)
            .run("mock", &monitor, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(http_error(502, None)) }
            })
            .await;

        assert!(result.is_err());
        // Sleeps of 1s, 2s, 4s: the fourth failure lands at t=7s, past the 5s ceiling
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(start.elapsed() >= Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_twice_then_succeed() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = Monitor::default();
        let counter = calls.clone();
        let result = policy(3, 5000)
            .run("mock", &monitor, || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(http_error(503, None))
                    } else {
                        Ok("rated")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "rated");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = Monitor::default();
        let counter = calls.clone();
        let result: ProviderResult<()> = policy(10, 60_000)
            .run("mock", &monitor, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(http_error(401, None)) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Http { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = Monitor::default();
        let counter = calls.clone();
        let start = Instant::now();
        let result = policy(5, 60_000)
            .run("mock", &monitor, || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(http_error(429, Some(Duration::from_secs(7))))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7));
        assert!(elapsed < Duration::from_secs(8));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.rate_limits.len(), 1);
        assert_eq!(snapshot.rate_limits[0].retry_after_ms, Some(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_without_hint_uses_default_then_exponential() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = Monitor::default();
        let counter = calls.clone();
        let start = Instant::now();
        let result = policy(5, 60_000)
            .run("mock", &monitor, || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(http_error(429, None))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        // 2s default for the first 429, then the doubled 4s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_secs(7));
        assert_eq!(monitor.snapshot().rate_limits.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_capped_at_max() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = Monitor::default();
        let counter = calls.clone();
        let mut p = policy(4, 600_000);
        p.max_backoff = Duration::from_millis(1500);
        let start = Instant::now();
        let result: ProviderResult<()> = p
            .run("mock", &monitor, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(http_error(429, Some(Duration::from_secs(30)))) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Three sleeps, each capped at 1.5s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(4500));
        assert!(elapsed < Duration::from_millis(5000));
    }
}
