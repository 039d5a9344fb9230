//! Buy-and-hold: go long once, on each symbol's first tradable bar.

use crate::domain::{Bar, Signal};

use super::Strategy;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuyAndHold;

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn generate_signals(&self, symbol: &str, history: &[Bar]) -> Vec<Signal> {
        let Some((bar, earlier)) = history.split_last() else {
            return Vec::new();
        };
        if bar.is_tradable() && !earlier.iter().any(Bar::is_tradable) {
            vec![Signal::long(symbol, bar.timestamp, bar.close)]
        } else {
            Vec::new()
        }
    }
}
