//! In-memory registry of provider batch jobs.
//!
//! Jobs are keyed by provider and provider job id, recorded at submission
//! with the filenames they were built from, refreshed on every status poll,
//! and pruned when they can no longer yield anything: immediately on
//! `failed`, after result retrieval on `completed`. The registry is bounded;
//! when full, the oldest job makes room. Nothing survives a restart.

use crate::provider::parse_batch_custom_id;
use crate::types::{BatchJob, BatchJobStatus, BatchState, PhotoRating, ProviderId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Jobs tracked at once unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 1000;

type JobKey = (ProviderId, String);

/// A tracked job and the filenames of its images, in submission order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedJob {
    #[serde(flatten)]
    pub status: BatchJobStatus,
    pub filenames: Vec<String>,
}

#[derive(Debug)]
pub struct BatchTracker {
    jobs: Mutex<HashMap<JobKey, TrackedJob>>,
    capacity: usize,
}

impl Default for BatchTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker holding at most `capacity` jobs (minimum one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobKey, TrackedJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key(provider: ProviderId, job_id: &str) -> JobKey {
        (provider, job_id.to_string())
    }

    /// Insert under `key`, evicting the oldest jobs first if the key is new
    /// and the registry is full.
    fn admit(&self, jobs: &mut HashMap<JobKey, TrackedJob>, key: JobKey, tracked: TrackedJob) {
        if !jobs.contains_key(&key) {
            while jobs.len() >= self.capacity {
                let Some(oldest) = jobs
                    .iter()
                    .min_by_key(|(_, t)| t.status.created_at)
                    .map(|(k, _)| k.clone())
                else {
                    break;
                };
                jobs.remove(&oldest);
                tracing::warn!(
                    provider = %oldest.0,
                    job_id = %oldest.1,
                    capacity = self.capacity,
                    "Batch tracker full, dropped oldest job"
                );
            }
        }
        jobs.insert(key, tracked);
    }

    /// Start tracking a freshly submitted job.
    pub fn insert(&self, job: &BatchJob, filenames: Vec<String>) {
        let status = BatchJobStatus {
            job_id: job.job_id.clone(),
            provider: job.provider,
            status: job.status,
            total_images: job.total_images,
            processed_images: job.processed_images,
            failed_images: 0,
            created_at: job.created_at,
            estimated_completion: job.estimated_completion,
            results: None,
            error: None,
        };
        let mut jobs = self.jobs();
        self.admit(
            &mut jobs,
            Self::key(job.provider, &job.job_id),
            TrackedJob { status, filenames },
        );
    }

    /// Record a polled status. A failed job is dropped.
    pub fn record_status(&self, status: &BatchJobStatus) {
        let key = Self::key(status.provider, &status.job_id);
        let mut jobs = self.jobs();
        if status.status == BatchState::Failed {
            if jobs.remove(&key).is_some() {
                tracing::info!(
                    provider = %status.provider,
                    job_id = %status.job_id,
                    "Batch job failed, no longer tracked"
                );
            }
            return;
        }
        let polled = BatchJobStatus {
            results: None,
            ..status.clone()
        };
        match jobs.get_mut(&key) {
            Some(tracked) => tracked.status = polled,
            None => {
                // Submitted before a restart or by another instance; track it
                // from its first poll.
                self.admit(
                    &mut jobs,
                    key,
                    TrackedJob {
                        status: polled,
                        filenames: Vec::new(),
                    },
                );
            }
        }
    }

    /// Stop tracking a job whose results have been collected.
    pub fn complete(&self, provider: ProviderId, job_id: &str) -> Option<TrackedJob> {
        self.jobs().remove(&Self::key(provider, job_id))
    }

    pub fn get(&self, provider: ProviderId, job_id: &str) -> Option<TrackedJob> {
        self.jobs().get(&Self::key(provider, job_id)).cloned()
    }

    /// All tracked jobs, oldest first.
    pub fn list(&self) -> Vec<TrackedJob> {
        let mut jobs: Vec<TrackedJob> = self.jobs().values().cloned().collect();
        jobs.sort_by(|a, b| a.status.created_at.cmp(&b.status.created_at));
        jobs
    }

    /// Jobs that have not reached a terminal state.
    pub fn active_count(&self) -> usize {
        self.jobs()
            .values()
            .filter(|t| !t.status.status.is_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Replace batch custom ids (`image-<n>`) with the submitted filenames.
    ///
    /// Ids that don't resolve are left as they are.
    pub fn resolve_filenames(
        &self,
        provider: ProviderId,
        job_id: &str,
        ratings: &mut [PhotoRating],
    ) {
        let jobs = self.jobs();
        let Some(tracked) = jobs.get(&Self::key(provider, job_id)) else {
            return;
        };
        for rating in ratings.iter_mut() {
            if let Some(name) =
                parse_batch_custom_id(&rating.image_id).and_then(|i| tracked.filenames.get(i))
            {
                rating.image_id = name.clone();
            }
        }
    }
}
