//! Scripted strategy — emits pre-planned signals at given timestamps.
//!
//! Used to replay a known signal sequence, e.g. several entries decided at
//! the same instant.

use crate::domain::{Bar, Signal, SignalKind, Timestamp};
use std::collections::BTreeMap;

use super::Strategy;

#[derive(Debug, Clone, Default)]
pub struct ScriptedStrategy {
    script: BTreeMap<(Timestamp, String), Vec<SignalKind>>,
}

impl ScriptedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `kind` for `symbol` on the bar stamped `at`. Repeated calls for
    /// the same bar emit in call order.
    pub fn at(mut self, at: Timestamp, symbol: impl Into<String>, kind: SignalKind) -> Self {
        self.script
            .entry((at, symbol.into()))
            .or_default()
            .push(kind);
        self
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate_signals(&self, symbol: &str, history: &[Bar]) -> Vec<Signal> {
        let Some(bar) = history.last() else {
            return Vec::new();
        };
        self.script
            .get(&(bar.timestamp, symbol.to_string()))
            .map(|kinds| {
                kinds
                    .iter()
                    .map(|&kind| Signal::new(symbol, kind, bar.timestamp, bar.close))
                    .collect()
            })
            .unwrap_or_default()
    }
}
