//! Fill model — turns a market order into a fill against the current bar.
//!
//! Fills happen at the bar close, moved against the order by a fixed slippage
//! plus an optional seeded jitter. The jitter for an order is derived from
//! `(seed, symbol, order id)` by hashing, so it does not depend on how many
//! other orders were filled before it.

use crate::config::ConfigError;
use crate::domain::{Bar, Fill, Order};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Executes orders. Must be deterministic for a given seed.
pub trait FillModel: std::fmt::Debug + Send + Sync {
    /// Fill `order` against `bar`, or `None` if the bar cannot fill it.
    fn execute(&self, order: &Order, bar: &Bar) -> Option<Fill>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillModelConfig {
    /// Adverse slippage in basis points (5 = 0.05%).
    pub slippage_bps: f64,
    /// Upper bound of the extra adverse jitter, in basis points.
    pub jitter_bps: f64,
    pub seed: u64,
}

impl Default for FillModelConfig {
    fn default() -> Self {
        Self {
            slippage_bps: 5.0,
            jitter_bps: 0.0,
            seed: 42,
        }
    }
}

impl FillModelConfig {
    /// Largest fraction of price a fill can move against the order.
    pub fn worst_case_slippage(&self) -> f64 {
        (self.slippage_bps + self.jitter_bps) / 10_000.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("slippage_bps", self.slippage_bps), ("jitter_bps", self.jitter_bps)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be >= 0, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Close-price fills with bps slippage, seeded jitter, and proportional commission.
#[derive(Debug, Clone)]
pub struct CostFillModel {
    slippage_bps: f64,
    jitter_bps: f64,
    commission_rate: f64,
    seed: u64,
}

impl CostFillModel {
    pub fn new(config: &FillModelConfig, commission_rate: f64) -> Self {
        Self {
            slippage_bps: config.slippage_bps,
            jitter_bps: config.jitter_bps,
            commission_rate,
            seed: config.seed,
        }
    }

    /// Frictionless fills at the close. Handy for accounting tests.
    pub fn frictionless() -> Self {
        Self {
            slippage_bps: 0.0,
            jitter_bps: 0.0,
            commission_rate: 0.0,
            seed: 0,
        }
    }

    fn jitter_bps_for(&self, order: &Order) -> f64 {
        if self.jitter_bps <= 0.0 {
            return 0.0;
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(order.symbol.as_bytes());
        hasher.update(&order.id.0.to_le_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(bytes));
        rng.gen_range(0.0..=self.jitter_bps)
    }
}

impl FillModel for CostFillModel {
    fn execute(&self, order: &Order, bar: &Bar) -> Option<Fill> {
        if !bar.is_tradable() || bar.symbol != order.symbol || order.quantity == 0 {
            return None;
        }

        let adverse_bps = self.slippage_bps + self.jitter_bps_for(order);
        let fill_price = bar.close * (1.0 + order.side.sign() as f64 * adverse_bps / 10_000.0);
        let notional = order.quantity as f64 * fill_price;

        Some(Fill {
            order_id: order.id,
            timestamp: bar.timestamp,
            symbol: order.symbol.clone(),
            quantity: order.signed_quantity(),
            fill_price,
            commission: notional * self.commission_rate,
        })
    }

    fn name(&self) -> &str {
        "CostFillModel"
    }
}
