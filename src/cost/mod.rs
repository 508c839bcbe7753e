//! # Cost Module
//!
//! Monetary cost of proxied calls.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CostCalculator`] | The host's cost-computation capability |
//! | [`FnCostCalculator`] | Adapter turning a closure into a calculator |
//! | [`PricingTable`] | Built-in per-model pricing calculator |
//! | [`CostResolver`] | Applies zero-cost overrides, then delegates |
//! | [`CostOutcome`] | Free, computed, or unavailable |

mod pricing;
mod resolver;

pub use pricing::{ModelPricing, PricingTable};
pub use resolver::{CostOutcome, CostResolver};

use async_trait::async_trait;

use crate::types::Response;
use crate::Result;

/// Prices a backend response. Supplied by the hosting proxy; may fail for
/// responses it cannot price. Shared across concurrent calls.
#[async_trait]
pub trait CostCalculator: Send + Sync {
    async fn compute_cost(&self, response: &Response) -> Result<f64>;
}

/// Synchronous closure as a [`CostCalculator`].
pub struct FnCostCalculator<F> {
    func: F,
}

impl<F> FnCostCalculator<F>
where
    F: Fn(&Response) -> Result<f64> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> CostCalculator for FnCostCalculator<F>
where
    F: Fn(&Response) -> Result<f64> + Send + Sync,
{
    async fn compute_cost(&self, response: &Response) -> Result<f64> {
        (self.func)(response)
    }
}
