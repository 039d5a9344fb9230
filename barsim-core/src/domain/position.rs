//! Position — signed holding in one symbol.

use super::Timestamp;
use serde::{Deserialize, Serialize};

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

/// A position in a single symbol.
///
/// `signed_quantity` is positive for longs and negative for shorts. The ledger
/// removes a position as soon as its quantity returns to exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub signed_quantity: i64,
    pub avg_entry_price: f64,
    pub entry_timestamp: Timestamp,
    /// Market events seen since entry.
    pub bars_held: usize,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    /// Highest mark since entry (long trailing reference).
    pub peak_price: f64,
    /// Lowest mark since entry (short trailing reference).
    pub trough_price: f64,
    /// Last price this position was marked at.
    pub mark_price: f64,
}

impl Position {
    /// Open a new position from a first fill.
    pub fn open(symbol: impl Into<String>, signed_quantity: i64, price: f64, at: Timestamp) -> Self {
        Self {
            symbol: symbol.into(),
            signed_quantity,
            avg_entry_price: price,
            entry_timestamp: at,
            bars_held: 0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            peak_price: price,
            trough_price: price,
            mark_price: price,
        }
    }

    pub fn side(&self) -> PositionSide {
        match self.signed_quantity {
            q if q > 0 => PositionSide::Long,
            q if q < 0 => PositionSide::Short,
            _ => PositionSide::Flat,
        }
    }

    pub fn is_long(&self) -> bool {
        self.signed_quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.signed_quantity < 0
    }

    pub fn is_flat(&self) -> bool {
        self.signed_quantity == 0
    }

    pub fn abs_quantity(&self) -> u64 {
        self.signed_quantity.unsigned_abs()
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.signed_quantity as f64 * price
    }

    pub fn unrealized_pnl_at(&self, price: f64) -> f64 {
        self.signed_quantity as f64 * (price - self.avg_entry_price)
    }

    /// Unrealized return at the last mark, as a fraction of entry price.
    /// Positive means the position is in profit regardless of direction.
    pub fn unrealized_pct(&self) -> f64 {
        self.return_pct_at(self.mark_price)
    }

    /// Best return reached since entry, derived from the peak/trough marks.
    pub fn best_return_pct(&self) -> f64 {
        match self.side() {
            PositionSide::Long => self.return_pct_at(self.peak_price),
            PositionSide::Short => self.return_pct_at(self.trough_price),
            PositionSide::Flat => 0.0,
        }
    }

    fn return_pct_at(&self, price: f64) -> f64 {
        if self.avg_entry_price <= 0.0 {
            return 0.0;
        }
        let raw = (price - self.avg_entry_price) / self.avg_entry_price;
        match self.side() {
            PositionSide::Long => raw,
            PositionSide::Short => -raw,
            PositionSide::Flat => 0.0,
        }
    }

    /// Update mark-dependent statistics.
    pub fn update_mark(&mut self, price: f64) {
        self.mark_price = price;
        self.unrealized_pnl = self.unrealized_pnl_at(price);
        self.peak_price = self.peak_price.max(price);
        self.trough_price = self.trough_price.min(price);
    }

    /// Count one more market event while open.
    pub fn tick_bar(&mut self) {
        self.bars_held += 1;
    }
}
