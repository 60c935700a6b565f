use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::TokenUsage;

/// The primary chat model and its tool-invocation sibling, as deployed.
pub const CHAT_MODEL: &str = "o3-mini";
pub const TOOL_MODEL: &str = "gpt-4o";

/// Price quotes for one model, in dollars per 1,000,000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million:        f64,
    pub cached_input_per_million: f64,
    pub output_per_million:       f64,
}

impl ModelPricing {
    pub fn new(input: f64, cached_input: f64, output: f64) -> Self {
        Self {
            input_per_million:        input,
            cached_input_per_million: cached_input,
            output_per_million:       output,
        }
    }

    /// Per-token rate derived from a per-1M quote.
    fn per_token(quote: f64) -> f64 {
        quote / 1_000_000.0
    }

    /// Dollar cost of one completion call.
    ///
    /// Cached prompt tokens are billed at the cached rate, the remainder
    /// of the prompt at the full input rate, and completion tokens at
    /// the output rate.
    pub fn cost(&self, usage: TokenUsage) -> f64 {
        let cached = usage.cached_tokens.min(usage.prompt_tokens);
        let non_cached = usage.prompt_tokens - cached;
        f64::from(non_cached) * Self::per_token(self.input_per_million)
            + f64::from(cached) * Self::per_token(self.cached_input_per_million)
            + f64::from(usage.completion_tokens) * Self::per_token(self.output_per_million)
    }
}

/// Model name to pricing map. Lookups for unlisted models return `None`
/// so a new model is never silently billed at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    models: HashMap<String, ModelPricing>,
}

impl PriceTable {
    pub fn empty() -> Self {
        Self { models: HashMap::new() }
    }

    pub fn with_model(mut self, name: impl Into<String>, pricing: ModelPricing) -> Self {
        self.models.insert(name.into(), pricing);
        self
    }

    pub fn pricing_for(&self, model: &str) -> Option<ModelPricing> {
        self.models.get(model).copied()
    }

    pub fn cost_for(&self, model: &str, usage: TokenUsage) -> Option<f64> {
        self.pricing_for(model).map(|pricing| pricing.cost(usage))
    }
}

impl Default for PriceTable {
    /// The deployed quotes for the two call-sites.
    fn default() -> Self {
        Self::empty()
            .with_model(CHAT_MODEL, ModelPricing::new(1.10, 0.55, 4.40))
            .with_model(TOOL_MODEL, ModelPricing::new(2.50, 1.25, 10.00))
    }
}
