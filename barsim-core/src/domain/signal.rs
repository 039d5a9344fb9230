//! Signals — typed trading intents produced by a strategy or the exit policy.

use super::order::OrderSide;
use super::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Long,
    Short,
    Exit,
}

impl SignalKind {
    /// Order side of an entry signal. Exits take the side opposite the position.
    pub fn entry_side(self) -> Option<OrderSide> {
        match self {
            Self::Long => Some(OrderSide::Buy),
            Self::Short => Some(OrderSide::Sell),
            Self::Exit => None,
        }
    }
}

/// Why the exit policy closed a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    CatastrophicStop,
    StopLoss,
    TrailingStop,
    TakeProfit,
    TechnicalReversal,
}

impl ExitReason {
    /// Exits that fire even while the holding period is still running.
    pub fn bypasses_holding_period(self) -> bool {
        matches!(
            self,
            Self::CatastrophicStop | Self::StopLoss | Self::TrailingStop
        )
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CatastrophicStop => "catastrophic_stop",
            Self::StopLoss => "stop_loss",
            Self::TrailingStop => "trailing_stop",
            Self::TakeProfit => "take_profit",
            Self::TechnicalReversal => "technical_reversal",
        };
        f.write_str(s)
    }
}

/// Where a signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalOrigin {
    Strategy,
    ExitPolicy(ExitReason),
}

/// A trading signal. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub kind: SignalKind,
    pub timestamp: Timestamp,
    pub reference_price: f64,
    pub origin: SignalOrigin,
}

impl Signal {
    pub fn new(
        symbol: impl Into<String>,
        kind: SignalKind,
        timestamp: Timestamp,
        reference_price: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            timestamp,
            reference_price,
            origin: SignalOrigin::Strategy,
        }
    }

    pub fn long(symbol: impl Into<String>, timestamp: Timestamp, reference_price: f64) -> Self {
        Self::new(symbol, SignalKind::Long, timestamp, reference_price)
    }

    pub fn short(symbol: impl Into<String>, timestamp: Timestamp, reference_price: f64) -> Self {
        Self::new(symbol, SignalKind::Short, timestamp, reference_price)
    }

    pub fn exit(symbol: impl Into<String>, timestamp: Timestamp, reference_price: f64) -> Self {
        Self::new(symbol, SignalKind::Exit, timestamp, reference_price)
    }

    /// Synthetic exit emitted by the exit policy engine.
    pub fn policy_exit(
        symbol: impl Into<String>,
        timestamp: Timestamp,
        reference_price: f64,
        reason: ExitReason,
    ) -> Self {
        Self {
            origin: SignalOrigin::ExitPolicy(reason),
            ..Self::exit(symbol, timestamp, reference_price)
        }
    }

    pub fn is_entry(&self) -> bool {
        self.kind != SignalKind::Exit
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        match self.origin {
            SignalOrigin::ExitPolicy(reason) => Some(reason),
            SignalOrigin::Strategy => None,
        }
    }
}
