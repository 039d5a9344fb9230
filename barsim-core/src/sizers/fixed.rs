//! Fixed Position Sizer
//!
//! Simplest sizer: trade a fixed quantity or fixed notional amount, never more
//! than the available cash can pay for.

use crate::domain::Signal;
use crate::sizers::{affordable_quantity, PositionSizer};

/// Fixed position sizer
///
/// Two modes:
/// 1. **Fixed Shares**: trade N shares (e.g., 100 shares per trade)
/// 2. **Fixed Notional**: trade $X worth (e.g., $10,000 per trade)
///
/// Both are capped at `available_cash / price`.
#[derive(Debug, Clone)]
pub enum FixedSizer {
    /// Fixed number of shares per trade
    Shares { quantity: f64 },

    /// Fixed dollar amount per trade
    Notional { amount: f64 },
}

impl FixedSizer {
    /// Create fixed shares sizer
    pub fn shares(quantity: f64) -> Self {
        assert!(quantity > 0.0, "quantity must be > 0");
        Self::Shares { quantity }
    }

    /// Create fixed notional sizer
    pub fn notional(amount: f64) -> Self {
        assert!(amount > 0.0, "amount must be > 0");
        Self::Notional { amount }
    }
}

impl PositionSizer for FixedSizer {
    fn size(&self, signal: &Signal, available_cash: f64, price: f64) -> f64 {
        if !signal.is_entry() {
            return 0.0;
        }

        let cap = affordable_quantity(available_cash, price);
        if cap <= 0.0 {
            return 0.0;
        }

        let wanted = match self {
            Self::Shares { quantity } => *quantity,
            Self::Notional { amount } => amount / price,
        };
        wanted.min(cap)
    }

    fn name(&self) -> &str {
        match self {
            Self::Shares { .. } => "FixedShares",
            Self::Notional { .. } => "FixedNotional",
        }
    }
}
