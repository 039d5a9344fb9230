//! Kelly-fraction sizer.
//!
//! Kelly fraction `f* = p - (1 - p) / b` for win probability `p` and payoff
//! ratio `b`, scaled down by `scale` (half-Kelly = 0.5) and applied to the
//! available cash. A non-positive edge sizes to zero.

use crate::domain::Signal;
use crate::sizers::{affordable_quantity, PositionSizer};

#[derive(Debug, Clone)]
pub struct KellySizer {
    win_rate: f64,
    payoff_ratio: f64,
    scale: f64,
}

impl KellySizer {
    pub fn new(win_rate: f64, payoff_ratio: f64, scale: f64) -> Self {
        assert!((0.0..=1.0).contains(&win_rate), "win_rate must be in [0, 1]");
        assert!(payoff_ratio > 0.0, "payoff_ratio must be > 0");
        assert!(scale > 0.0 && scale <= 1.0, "scale must be in (0, 1]");
        Self {
            win_rate,
            payoff_ratio,
            scale,
        }
    }

    /// Scaled Kelly fraction, clamped to [0, 1].
    pub fn fraction(&self) -> f64 {
        let full = self.win_rate - (1.0 - self.win_rate) / self.payoff_ratio;
        (full * self.scale).clamp(0.0, 1.0)
    }
}

impl PositionSizer for KellySizer {
    fn size(&self, signal: &Signal, available_cash: f64, price: f64) -> f64 {
        if !signal.is_entry() {
            return 0.0;
        }
        affordable_quantity(available_cash * self.fraction(), price)
    }

    fn name(&self) -> &str {
        "KellyFraction"
    }
}
