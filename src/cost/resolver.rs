//! Cost resolution with zero-cost provider overrides.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::CostCalculator;
use crate::types::Response;

/// Outcome of pricing one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CostOutcome {
    /// The backend is on the zero-cost list; the calculator was not consulted.
    Free,
    Computed { amount: f64 },
    /// The calculator could not price the response.
    Unavailable { reason: String },
}

impl CostOutcome {
    /// Monetary cost, absent when it could not be computed.
    pub fn amount(&self) -> Option<f64> {
        match self {
            CostOutcome::Free => Some(0.0),
            CostOutcome::Computed { amount } => Some(*amount),
            CostOutcome::Unavailable { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            CostOutcome::Unavailable { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Decides the cost of a call.
pub struct CostResolver {
    zero_cost_providers: Vec<String>,
    calculator: Arc<dyn CostCalculator>,
}

impl CostResolver {
    pub fn new(calculator: Arc<dyn CostCalculator>) -> Self {
        Self {
            zero_cost_providers: Vec::new(),
            calculator,
        }
    }

    pub fn with_zero_cost_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zero_cost_providers = providers
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        self
    }

    /// Case-sensitive substring match against the configured providers.
    pub fn is_zero_cost(&self, api_base: Option<&str>) -> bool {
        match api_base {
            Some(base) => self
                .zero_cost_providers
                .iter()
                .any(|p| base.contains(p.as_str())),
            None => false,
        }
    }

    /// Price `response`. Never fails: calculator errors and nonsensical
    /// amounts become [`CostOutcome::Unavailable`].
    pub async fn resolve(&self, api_base: Option<&str>, response: &Response) -> CostOutcome {
        if self.is_zero_cost(api_base) {
            return CostOutcome::Free;
        }
        match self.calculator.compute_cost(response).await {
            Ok(amount) if amount.is_finite() && amount >= 0.0 => CostOutcome::Computed { amount },
            Ok(amount) => {
                warn!(amount, "cost calculator returned an invalid amount");
                CostOutcome::Unavailable {
                    reason: format!("invalid cost amount: {}", amount),
                }
            }
            Err(e) => {
                warn!(error = %e, "cost computation failed");
                CostOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for CostResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostResolver")
            .field("zero_cost_providers", &self.zero_cost_providers)
            .finish_non_exhaustive()
    }
}
