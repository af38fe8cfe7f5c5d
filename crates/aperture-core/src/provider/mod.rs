//! Vision provider adapters.
//!
//! Every provider implements [`RatingProvider`]. Adapters share one retry
//! engine, one output validator and the HTTP helpers in `http`; they differ
//! only in wire format and batch lifecycle.

pub mod anthropic;
pub mod compatible;
pub mod contract;
pub mod google;
mod http;
pub mod openai;
pub mod registry;
pub mod retry;
pub mod schema;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

pub use anthropic::AnthropicProvider;
pub use compatible::CompatibleProvider;
pub use contract::{
    batch_custom_id, data_url, encode_base64, mime_type, parse_batch_custom_id, ProviderContext,
    RatingProvider,
};
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;
pub use registry::{ProviderInfo, ProviderRegistry};
pub use retry::{is_retryable, RetryPolicy};
pub use validate::{clamp_stars, extract_json_object, validate_rating};
