//! Position sizers — turn a signal into a share count.
//!
//! A sizer is a pure function of `(signal, available_cash, price)`. It never
//! sees the ledger, only the unreserved cash figure the engine hands it at the
//! moment of sizing, so any sizing rule composes with the reservation scheme.

pub mod cash_fraction;
pub mod fixed;
pub mod kelly;

pub use cash_fraction::CashFractionSizer;
pub use fixed::FixedSizer;
pub use kelly::KellySizer;

use crate::domain::Signal;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Position sizing logic.
///
/// # Responsibilities
/// - Convert signal + available cash + price → target quantity
/// - Never request more than `available_cash` can pay for at `price`
///
/// # Non-Responsibilities
/// - Sizers do NOT decide entry/exit (that's the strategy's job)
/// - Sizers do NOT reserve cash (that's the ledger's job)
/// - Sizers do NOT round to lots (the engine does)
pub trait PositionSizer: Debug + Send + Sync {
    /// Target quantity for `signal`. Returns 0.0 when nothing should trade.
    fn size(&self, signal: &Signal, available_cash: f64, price: f64) -> f64;

    /// Sizer name for logging.
    fn name(&self) -> &str;
}

/// Largest whole-or-fractional quantity `available_cash` buys at `price`.
///
/// Zero for unusable inputs (non-positive cash or price, NaN).
pub fn affordable_quantity(available_cash: f64, price: f64) -> f64 {
    if !(available_cash.is_finite() && price.is_finite()) || available_cash <= 0.0 || price <= 0.0
    {
        return 0.0;
    }
    available_cash / price
}

/// Sizer selection, resolved once at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizerConfig {
    /// Fixed dollar amount per entry, capped at available cash.
    FixedNotional { amount: f64 },

    /// Fixed number of shares per entry, capped at available cash.
    FixedShares { shares: f64 },

    /// Fraction of available cash per entry.
    CashFraction { fraction: f64 },

    /// Fractional Kelly bet from an assumed edge.
    KellyFraction {
        win_rate: f64,
        payoff_ratio: f64,
        scale: f64,
    },
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self::FixedNotional { amount: 10_000.0 }
    }
}

impl SizerConfig {
    pub fn build(&self) -> Box<dyn PositionSizer> {
        match *self {
            Self::FixedNotional { amount } => Box::new(FixedSizer::notional(amount)),
            Self::FixedShares { shares } => Box::new(FixedSizer::shares(shares)),
            Self::CashFraction { fraction } => Box::new(CashFractionSizer::new(fraction)),
            Self::KellyFraction {
                win_rate,
                payoff_ratio,
                scale,
            } => Box::new(KellySizer::new(win_rate, payoff_ratio, scale)),
        }
    }

    /// Parameter problems, if any. `None` means the config builds cleanly.
    pub fn problem(&self) -> Option<String> {
        match *self {
            Self::FixedNotional { amount } if !(amount.is_finite() && amount > 0.0) => {
                Some(format!("notional amount must be > 0, got {amount}"))
            }
            Self::FixedShares { shares } if !(shares.is_finite() && shares > 0.0) => {
                Some(format!("share count must be > 0, got {shares}"))
            }
            Self::CashFraction { fraction } if !(fraction > 0.0 && fraction <= 1.0) => {
                Some(format!("cash fraction must be in (0, 1], got {fraction}"))
            }
            Self::KellyFraction {
                win_rate,
                payoff_ratio,
                scale,
            } => {
                if !(0.0..=1.0).contains(&win_rate) {
                    Some(format!("win rate must be in [0, 1], got {win_rate}"))
                } else if !(payoff_ratio.is_finite() && payoff_ratio > 0.0) {
                    Some(format!("payoff ratio must be > 0, got {payoff_ratio}"))
                } else if !(scale > 0.0 && scale <= 1.0) {
                    Some(format!("kelly scale must be in (0, 1], got {scale}"))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}
