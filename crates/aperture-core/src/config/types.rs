//! Sub-configuration structs with their defaults.

use crate::cost::{CostRates, ImageCostEstimate};
use crate::types::ProviderId;
use serde::{Deserialize, Serialize};

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body in megabytes (batches carry base64 images)
    pub max_body_mb: usize,

    /// Per-request deadline for outbound provider calls
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            max_body_mb: 100,
            request_timeout_ms: 120_000,
        }
    }
}

/// Retry/backoff settings shared by all providers.
///
/// Retries stop at whichever bound trips first: attempt count or total time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Max attempts, including the first call
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Backoff cap in milliseconds
    pub max_backoff_ms: u64,

    /// Wall-clock ceiling across all attempts in milliseconds
    pub max_retry_time_ms: u64,

    /// Delay for a 429 without `Retry-After` (first occurrence only)
    pub rate_limit_default_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1000,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            max_retry_time_ms: 6 * 60 * 60 * 1000,
            rate_limit_default_delay_ms: 2000,
        }
    }
}

/// Per-provider settings as written in the config file.
///
/// Any field left out falls back to the provider's built-in default, so a
/// section may override just the model or the key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// API key (supports ${ENV_VAR} syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Base URL, without the API path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// USD per million input tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_cost_per_mtok: Option<f64>,

    /// USD per million output tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cost_per_mtok: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Fully resolved provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub input_cost_per_mtok: f64,
    pub output_cost_per_mtok: f64,
    pub max_tokens: u32,
}

impl ProviderSettings {
    /// Built-in defaults for a provider.
    pub fn defaults(id: ProviderId) -> Self {
        let (api_key, model, endpoint, input, output) = match id {
            ProviderId::Anthropic => (
                "${ANTHROPIC_API_KEY}",
                "claude-sonnet-4-5",
                "https://api.anthropic.com",
                3.00,
                15.00,
            ),
            ProviderId::Openai => (
                "${OPENAI_API_KEY}",
                "gpt-4o",
                "https://api.openai.com",
                2.50,
                10.00,
            ),
            ProviderId::Google => (
                "${GOOGLE_API_KEY}",
                "gemini-2.5-flash",
                "https://generativelanguage.googleapis.com",
                0.30,
                2.50,
            ),
            ProviderId::Grok => (
                "${XAI_API_KEY}",
                "grok-2-vision-1212",
                "https://api.x.ai",
                2.00,
                10.00,
            ),
            ProviderId::Groq => (
                "${GROQ_API_KEY}",
                "meta-llama/llama-4-scout-17b-16e-instruct",
                "https://api.groq.com/openai",
                0.11,
                0.34,
            ),
        };
        Self {
            enabled: true,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
            input_cost_per_mtok: input,
            output_cost_per_mtok: output,
            max_tokens: 1024,
        }
    }

    pub fn rates(&self) -> CostRates {
        CostRates::new(self.input_cost_per_mtok, self.output_cost_per_mtok)
    }
}

impl From<ProviderSettings> for ProviderConfig {
    fn from(s: ProviderSettings) -> Self {
        Self {
            enabled: Some(s.enabled),
            api_key: Some(s.api_key),
            model: Some(s.model),
            endpoint: Some(s.endpoint),
            input_cost_per_mtok: Some(s.input_cost_per_mtok),
            output_cost_per_mtok: Some(s.output_cost_per_mtok),
            max_tokens: Some(s.max_tokens),
        }
    }
}

impl ProviderConfig {
    /// Fill unset fields from the provider's defaults.
    pub fn resolve(&self, id: ProviderId) -> ProviderSettings {
        let d = ProviderSettings::defaults(id);
        ProviderSettings {
            enabled: self.enabled.unwrap_or(d.enabled),
            api_key: self.api_key.clone().unwrap_or(d.api_key),
            model: self.model.clone().unwrap_or(d.model),
            endpoint: self.endpoint.clone().unwrap_or(d.endpoint),
            input_cost_per_mtok: self.input_cost_per_mtok.unwrap_or(d.input_cost_per_mtok),
            output_cost_per_mtok: self.output_cost_per_mtok.unwrap_or(d.output_cost_per_mtok),
            max_tokens: self.max_tokens.unwrap_or(d.max_tokens),
        }
    }
}

/// Provider sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub anthropic: ProviderConfig,
    pub openai: ProviderConfig,
    pub google: ProviderConfig,
    pub grok: ProviderConfig,
    pub groq: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        let section = |id| ProviderConfig::from(ProviderSettings::defaults(id));
        Self {
            anthropic: section(ProviderId::Anthropic),
            openai: section(ProviderId::Openai),
            google: section(ProviderId::Google),
            grok: section(ProviderId::Grok),
            groq: section(ProviderId::Groq),
        }
    }
}

impl ProvidersConfig {
    pub fn section(&self, id: ProviderId) -> &ProviderConfig {
        match id {
            ProviderId::Anthropic => &self.anthropic,
            ProviderId::Openai => &self.openai,
            ProviderId::Google => &self.google,
            ProviderId::Grok => &self.grok,
            ProviderId::Groq => &self.groq,
        }
    }

    /// Resolved settings for one provider.
    pub fn settings(&self, id: ProviderId) -> ProviderSettings {
        self.section(id).resolve(id)
    }
}

/// Per-image price quoting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Typical prompt + image tokens for one rating call
    pub estimated_input_tokens: u64,

    /// Typical completion tokens for one rating
    pub estimated_output_tokens: u64,

    /// Fraction of the synchronous rate billed by batch APIs
    pub batch_discount: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let estimate = ImageCostEstimate::default();
        Self {
            estimated_input_tokens: estimate.input_tokens,
            estimated_output_tokens: estimate.output_tokens,
            batch_discount: 0.5,
        }
    }
}

impl PricingConfig {
    pub fn estimate(&self) -> ImageCostEstimate {
        ImageCostEstimate {
            input_tokens: self.estimated_input_tokens,
            output_tokens: self.estimated_output_tokens,
        }
    }
}

/// Observability buffer sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub rate_limit_log_capacity: usize,
    pub error_log_capacity: usize,

    /// Batch jobs tracked at once; the oldest is dropped when full
    pub batch_job_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rate_limit_log_capacity: 100,
            error_log_capacity: 100,
            batch_job_capacity: 1000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
