//! Moving average crossover — golden cross entry, death cross exit.
//!
//! Fires Long when the fast SMA crosses above the slow SMA.
//! Fires Exit when the fast SMA crosses back below; the exit policy treats
//! that as a technical reversal.

use crate::domain::{Bar, Signal};

use super::Strategy;

#[derive(Debug, Clone)]
pub struct MaCrossover {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl MaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        assert!(fast_period >= 1, "fast_period must be >= 1");
        assert!(
            slow_period > fast_period,
            "slow_period must be > fast_period"
        );
        Self {
            fast_period,
            slow_period,
        }
    }
}

/// Simple moving average of the `period` closes ending at `end` (exclusive).
fn sma(bars: &[Bar], end: usize, period: usize) -> Option<f64> {
    if period == 0 || end < period {
        return None;
    }
    let window = &bars[end - period..end];
    let sum: f64 = window.iter().map(|b| b.close).sum();
    let mean = sum / period as f64;
    mean.is_finite().then_some(mean)
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn generate_signals(&self, symbol: &str, history: &[Bar]) -> Vec<Signal> {
        // Need the slow window on both the current and the previous bar.
        let n = history.len();
        if n <= self.slow_period {
            return Vec::new();
        }
        let Some(bar) = history.last() else {
            return Vec::new();
        };
        if !bar.close.is_finite() {
            return Vec::new();
        }

        let (Some(fast_cur), Some(slow_cur), Some(fast_prev), Some(slow_prev)) = (
            sma(history, n, self.fast_period),
            sma(history, n, self.slow_period),
            sma(history, n - 1, self.fast_period),
            sma(history, n - 1, self.slow_period),
        ) else {
            return Vec::new();
        };

        if fast_cur > slow_cur && fast_prev <= slow_prev {
            vec![Signal::long(symbol, bar.timestamp, bar.close)]
        } else if fast_cur < slow_cur && fast_prev >= slow_prev {
            vec![Signal::exit(symbol, bar.timestamp, bar.close)]
        } else {
            Vec::new()
        }
    }
}
