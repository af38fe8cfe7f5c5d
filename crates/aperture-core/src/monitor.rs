//! In-memory observability: rate-limit log, error log, active-request gauges.
//!
//! Logs are fixed-capacity rings that evict oldest-first, so memory stays
//! bounded for the life of the process. One [`Monitor`] is created by the
//! gateway and shared by `Arc` with the providers and the dispatcher.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Fixed-capacity FIFO that drops the oldest entry when full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an item, evicting the oldest one if at capacity.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// A provider-signalled rate limit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitEvent {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub attempt: u32,
    /// `Retry-After` hint, when the provider sent one
    pub retry_after_ms: Option<u64>,
    /// Delay actually slept before the next attempt
    pub delay_ms: u64,
}

/// A failure surfaced to a caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub timestamp: DateTime<Utc>,
    pub provider: Option<String>,
    pub operation: String,
    pub message: String,
}

/// Point-in-time copy of all monitor state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub rate_limits: Vec<RateLimitEvent>,
    pub errors: Vec<ErrorEvent>,
    pub active_requests: BTreeMap<String, usize>,
}

/// Shared observability state.
#[derive(Debug)]
pub struct Monitor {
    rate_limits: Mutex<RingBuffer<RateLimitEvent>>,
    errors: Mutex<RingBuffer<ErrorEvent>>,
    active: Mutex<BTreeMap<String, usize>>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Monitor {
    pub fn new(rate_limit_capacity: usize, error_capacity: usize) -> Self {
        Self {
            rate_limits: Mutex::new(RingBuffer::new(rate_limit_capacity)),
            errors: Mutex::new(RingBuffer::new(error_capacity)),
            active: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_rate_limit(
        &self,
        provider: &str,
        attempt: u32,
        retry_after: Option<Duration>,
        delay: Duration,
    ) {
        lock(&self.rate_limits).push(RateLimitEvent {
            timestamp: Utc::now(),
            provider: provider.to_string(),
            attempt,
            retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
            delay_ms: delay.as_millis() as u64,
        });
    }

    pub fn record_error(&self, provider: Option<&str>, operation: &str, message: &str) {
        lock(&self.errors).push(ErrorEvent {
            timestamp: Utc::now(),
            provider: provider.map(String::from),
            operation: operation.to_string(),
            message: message.to_string(),
        });
    }

    /// Count an in-flight request until the returned guard is dropped.
    pub fn track_request(self: &Arc<Self>, provider: &str) -> ActiveRequestGuard {
        *lock(&self.active).entry(provider.to_string()).or_insert(0) += 1;
        ActiveRequestGuard {
            monitor: Arc::clone(self),
            provider: provider.to_string(),
        }
    }

    pub fn active_requests(&self, provider: &str) -> usize {
        lock(&self.active).get(provider).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            rate_limits: lock(&self.rate_limits).iter().cloned().collect(),
            errors: lock(&self.errors).iter().cloned().collect(),
            active_requests: lock(&self.active).clone(),
        }
    }
}

/// Decrements the provider's active-request gauge on drop.
#[derive(Debug)]
pub struct ActiveRequestGuard {
    monitor: Arc<Monitor>,
    provider: String,
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        let mut active = lock(&self.monitor.active);
        if let Some(count) = active.get_mut(&self.provider) {
            *count = count.saturating_sub(1);
        }
    }
}
