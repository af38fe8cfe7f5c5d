//! Batch-job tracking and concurrent multi-image dispatch.

pub mod dispatcher;
pub mod tracker;

pub use dispatcher::{DispatchItem, DispatchReport, DispatchSummary, Dispatcher};
pub use tracker::{BatchTracker, TrackedJob};
