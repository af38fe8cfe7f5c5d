//! Startup-time provider construction and lookup.

use super::anthropic::AnthropicProvider;
use super::compatible::CompatibleProvider;
use super::contract::{ProviderContext, RatingProvider};
use super::google::GoogleProvider;
use super::http::network_error;
use super::openai::OpenAiProvider;
use super::retry::RetryPolicy;
use crate::config::{resolve_env_var, Config};
use crate::error::{ProviderError, ProviderResult, Result};
use crate::monitor::Monitor;
use crate::types::ProviderId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Provider metadata served by the providers listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: ProviderId,
    pub name: String,
    pub model: String,
    pub cost_per_image: f64,
    pub user_charge_per_image: f64,
    pub supports_batch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_cost_per_image: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_user_charge_per_image: Option<f64>,
}

/// The configured providers, built once at startup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<dyn RatingProvider>>,
}

impl ProviderRegistry {
    /// Build every enabled provider whose API key resolves.
    ///
    /// All adapters share one HTTP client (and its per-request deadline),
    /// the retry policy and the monitor.
    pub fn from_config(config: &Config, monitor: Arc<Monitor>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.server.request_timeout_ms))
            .build()
            .map_err(|e| network_error("http-client", e))?;
        let retry = RetryPolicy::from(&config.retry);

        let mut providers = HashMap::new();
        for id in ProviderId::ALL {
            let mut settings = config.providers.settings(id);
            if !settings.enabled {
                tracing::info!(provider = %id, "Provider disabled in config");
                continue;
            }
            let Some(api_key) = resolve_env_var(&settings.api_key) else {
                tracing::warn!(
                    provider = %id,
                    "Skipping provider: API key not set ({})",
                    settings.api_key
                );
                continue;
            };
            settings.api_key = api_key;

            let ctx = ProviderContext::new(settings, client.clone())
                .with_retry(retry.clone())
                .with_monitor(monitor.clone())
                .with_pricing(config.pricing.estimate(), config.pricing.batch_discount);
            let provider = Self::create(id, ctx);
            tracing::debug!(provider = %id, model = provider.model(), "Provider ready");
            providers.insert(id, provider);
        }

        if providers.is_empty() {
            tracing::warn!("No providers configured; every rating request will be rejected");
        }
        Ok(Self { providers })
    }

    /// Construct the adapter for `id`.
    pub fn create(id: ProviderId, ctx: ProviderContext) -> Arc<dyn RatingProvider> {
        match id {
            ProviderId::Anthropic => Arc::new(AnthropicProvider::new(ctx)),
            ProviderId::Openai => Arc::new(OpenAiProvider::new(ctx)),
            ProviderId::Google => Arc::new(GoogleProvider::new(ctx)),
            ProviderId::Grok => Arc::new(CompatibleProvider::grok(ctx)),
            ProviderId::Groq => Arc::new(CompatibleProvider::groq(ctx)),
        }
    }

    /// Registry over already-built providers (tests, embedding).
    pub fn from_providers(list: Vec<Arc<dyn RatingProvider>>) -> Self {
        Self {
            providers: list.into_iter().map(|p| (p.id(), p)).collect(),
        }
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn RatingProvider>> {
        self.providers.get(&id).cloned()
    }

    /// Like [`get`](Self::get), but a missing provider is an error.
    pub fn require(&self, id: ProviderId) -> ProviderResult<Arc<dyn RatingProvider>> {
        self.get(id).ok_or_else(|| ProviderError::NotConfigured {
            provider: id.to_string(),
            message: "provider is disabled or its API key is not set".to_string(),
        })
    }

    /// Configured providers in canonical order.
    pub fn list(&self) -> Vec<ProviderInfo> {
        ProviderId::ALL
            .into_iter()
            .filter_map(|id| self.providers.get(&id))
            .map(|p| ProviderInfo {
                id: p.id(),
                name: p.name().to_string(),
                model: p.model().to_string(),
                cost_per_image: p.cost_per_image(),
                user_charge_per_image: p.user_charge_per_image(),
                supports_batch: p.supports_batch(),
                batch_cost_per_image: p.batch_cost_per_image(),
                batch_user_charge_per_image: p.batch_user_charge_per_image(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list().iter().map(|p| p.id).collect::<Vec<_>>())
            .finish()
    }
}
