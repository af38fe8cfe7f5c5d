//! Cost accounting shared by every provider.
//!
//! Providers bill per million tokens. The end-user charge is always the
//! billed provider cost times [`USER_MARKUP`], including for batch-discounted
//! rates.

use serde::{Deserialize, Serialize};

/// Multiplier applied to provider cost to produce the end-user charge.
pub const USER_MARKUP: f64 = 2.0;

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// End-user charge for a provider cost.
pub fn calculate_user_charge(provider_cost_usd: f64) -> f64 {
    provider_cost_usd * USER_MARKUP
}

/// Per-million-token pricing for one provider (or its batch tier).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl CostRates {
    pub fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    /// Rates scaled by a discount factor (0.5 for batch APIs).
    pub fn discounted(&self, factor: f64) -> Self {
        Self {
            input_per_mtok: self.input_per_mtok * factor,
            output_per_mtok: self.output_per_mtok * factor,
        }
    }

    /// Provider cost of a call with the given token usage.
    pub fn cost_of(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 / TOKENS_PER_MILLION * self.input_per_mtok
            + output_tokens as f64 / TOKENS_PER_MILLION * self.output_per_mtok
    }
}

/// Token usage and pricing for one rated image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(rename = "inputCostUSD")]
    pub input_cost_usd: f64,
    #[serde(rename = "outputCostUSD")]
    pub output_cost_usd: f64,
    #[serde(rename = "totalCostUSD")]
    pub total_cost_usd: f64,
    #[serde(rename = "userChargeUSD")]
    pub user_charge_usd: f64,
}

impl CostBreakdown {
    /// Price a call's token usage at the given rates.
    pub fn from_usage(input_tokens: u64, output_tokens: u64, rates: CostRates) -> Self {
        let input_cost_usd = input_tokens as f64 / TOKENS_PER_MILLION * rates.input_per_mtok;
        let output_cost_usd = output_tokens as f64 / TOKENS_PER_MILLION * rates.output_per_mtok;
        let total_cost_usd = input_cost_usd + output_cost_usd;
        Self {
            input_tokens,
            output_tokens,
            input_cost_usd,
            output_cost_usd,
            total_cost_usd,
            user_charge_usd: calculate_user_charge(total_cost_usd),
        }
    }
}

/// Token totals summed over the successful items of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens = self.input_tokens.saturating_add(input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(output_tokens);
    }

    pub fn price(&self, rates: CostRates) -> CostBreakdown {
        CostBreakdown::from_usage(self.input_tokens, self.output_tokens, rates)
    }
}

/// Token counts used to quote a per-image price before any call is made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageCostEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Default for ImageCostEstimate {
    fn default() -> Self {
        Self {
            input_tokens: 1600,
            output_tokens: 400,
        }
    }
}

impl ImageCostEstimate {
    /// Estimated provider cost of rating one image at `rates`.
    pub fn price(&self, rates: CostRates) -> f64 {
        rates.cost_of(self.input_tokens, self.output_tokens)
    }
}
