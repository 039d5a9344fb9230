//! Per-symbol bar history, grown one market event at a time.

use crate::domain::Bar;
use std::collections::BTreeMap;

/// Bars seen so far, keyed by symbol. Nothing from the future is ever here.
#[derive(Debug, Clone, Default)]
pub struct BarHistory {
    bars: BTreeMap<String, Vec<Bar>>,
}

impl BarHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bar: Bar) {
        self.bars.entry(bar.symbol.clone()).or_default().push(bar);
    }

    pub fn latest_bar(&self, symbol: &str) -> Option<&Bar> {
        self.bars.get(symbol).and_then(|b| b.last())
    }

    /// All bars for `symbol`, oldest first. Empty if never seen.
    pub fn history(&self, symbol: &str) -> &[Bar] {
        self.bars.get(symbol).map_or(&[], Vec::as_slice)
    }

    /// Symbols seen so far, sorted.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }
}
