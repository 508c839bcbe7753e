//! Model pricing table, usable as the default cost-computation capability.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::CostCalculator;
use crate::types::{Response, TokenUsage};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Substring matched against the response's model name.
    pub model: String,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".into()
}

impl ModelPricing {
    pub fn new(model: &str, input: f64, output: f64) -> Self {
        Self {
            model: model.into(),
            input_cost_per_1k: input,
            output_cost_per_1k: output,
            currency: default_currency(),
        }
    }

    pub fn calculate_cost(&self, usage: &TokenUsage) -> f64 {
        let ic = (usage.prompt_tokens as f64 / 1000.0) * self.input_cost_per_1k;
        let oc = (usage.completion_tokens as f64 / 1000.0) * self.output_cost_per_1k;
        ic + oc
    }
}

static BUILTIN: Lazy<Vec<ModelPricing>> = Lazy::new(|| {
    vec![
        ModelPricing::new("gpt-4o-mini", 0.00015, 0.0006),
        ModelPricing::new("gpt-4o", 0.005, 0.015),
        ModelPricing::new("claude-3-5-sonnet", 0.003, 0.015),
        ModelPricing::new("claude-3-haiku", 0.00025, 0.00125),
    ]
});

/// Prices responses from a per-model table.
///
/// Lookup is by substring of the lower-cased model name; the longest matching
/// key wins, so `gpt-4o-mini` is not priced as `gpt-4o`.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: Vec<ModelPricing>,
}

impl PricingTable {
    pub fn new(entries: Vec<ModelPricing>) -> Self {
        let mut entries: Vec<ModelPricing> = entries
            .into_iter()
            .map(|mut p| {
                p.model = p.model.to_lowercase();
                p
            })
            .collect();
        entries.sort_by(|a, b| b.model.len().cmp(&a.model.len()));
        Self { entries }
    }

    /// Built-in list prices for a few common models.
    pub fn builtin() -> Self {
        Self::new(BUILTIN.clone())
    }

    pub fn with(mut self, pricing: ModelPricing) -> Self {
        let mut entries = std::mem::take(&mut self.entries);
        entries.push(pricing);
        Self::new(entries)
    }

    pub fn for_model(&self, model: &str) -> Option<&ModelPricing> {
        let m = model.to_lowercase();
        self.entries.iter().find(|p| m.contains(p.model.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CostCalculator for PricingTable {
    async fn compute_cost(&self, response: &Response) -> Result<f64> {
        let model = response.model();
        let pricing = model
            .and_then(|m| self.for_model(m))
            .ok_or_else(|| Error::cost(model, "no pricing entry for model"))?;
        let usage = response
            .usage
            .as_ref()
            .ok_or_else(|| Error::cost(model, "response carries no usage"))?;
        Ok(pricing.calculate_cost(usage))
    }
}
