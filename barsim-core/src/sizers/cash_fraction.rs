//! Cash-fraction sizer: commit a fixed share of the available cash.

use crate::domain::Signal;
use crate::sizers::{affordable_quantity, PositionSizer};

#[derive(Debug, Clone)]
pub struct CashFractionSizer {
    fraction: f64,
}

impl CashFractionSizer {
    pub fn new(fraction: f64) -> Self {
        assert!(
            fraction > 0.0 && fraction <= 1.0,
            "fraction must be in (0, 1]"
        );
        Self { fraction }
    }
}

impl PositionSizer for CashFractionSizer {
    fn size(&self, signal: &Signal, available_cash: f64, price: f64) -> f64 {
        if !signal.is_entry() {
            return 0.0;
        }
        affordable_quantity(available_cash * self.fraction, price)
    }

    fn name(&self) -> &str {
        "CashFraction"
    }
}
