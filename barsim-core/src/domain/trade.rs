//! TradeRecord — a completed round-trip trade.

use super::position::PositionSide;
use super::signal::ExitReason;
use super::Timestamp;
use serde::{Deserialize, Serialize};

/// A complete round-trip trade record: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: PositionSide,

    pub entry_timestamp: Timestamp,
    pub entry_price: f64,

    pub exit_timestamp: Timestamp,
    pub exit_price: f64,

    pub quantity: u64,

    /// PnL before commission, realized at the average entry price.
    pub gross_pnl: f64,
    /// Commission on the opening and closing fills.
    pub commission: f64,
    pub net_pnl: f64,

    pub bars_held: usize,
    /// `None` for closes that did not come from the exit policy.
    pub exit_reason: Option<ExitReason>,
}

impl TradeRecord {
    /// Return on the trade as a fraction of entry cost.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.quantity == 0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.quantity as f64)
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}
