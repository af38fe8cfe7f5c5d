//! Aperture Core - provider abstraction for the Aperture rating gateway.
//!
//! Aperture forwards photos and prompts to one of five vision providers
//! (Anthropic, OpenAI, Google, xAI Grok, Groq), retries transient failures,
//! normalizes whatever the model returns into one canonical [`PhotoRating`],
//! and prices every call.
//!
//! # Architecture
//!
//! ```text
//! request → ProviderRegistry → RatingProvider ─┬─ process_single_image (retry engine)
//!                                              └─ submit / poll / retrieve batch
//! many images → Dispatcher (fan-out, order preserved) → per-item results + summary
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use aperture_core::{Config, Monitor, ProviderId, ProviderRegistry, RatingRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> aperture_core::Result<()> {
//!     let config = Config::load()?;
//!     let registry = ProviderRegistry::from_config(&config, Arc::new(Monitor::default()))?;
//!     let provider = registry.require(ProviderId::Anthropic)?;
//!
//!     let result = provider.process_single_image(&request).await?;
//!     println!("{} stars", result.rating.star_rating);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod batch;
pub mod config;
pub mod cost;
pub mod error;
pub mod monitor;
pub mod provider;
pub mod types;

// Re-exports for convenient access
pub use batch::{BatchTracker, DispatchReport, Dispatcher};
pub use config::Config;
pub use cost::{calculate_user_charge, CostBreakdown, TokenUsage, USER_MARKUP};
pub use error::{ApertureError, ConfigError, ProviderError, ProviderResult, Result};
pub use monitor::{Monitor, MonitorSnapshot};
pub use provider::{ProviderInfo, ProviderRegistry, RatingProvider, RetryPolicy};
pub use types::{
    BatchJob, BatchJobStatus, BatchRequest, BatchResults, BatchState, ImageFormat, ImageInput,
    ImageMetadata, PhotoRating, ProcessingResult, ProviderId, RatingRequest,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
