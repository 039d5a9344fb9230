//! Run errors, per-signal outcomes, and the run result.

use crate::domain::{
    Fill, Order, OrderError, OrderId, SignalKind, SignalOrigin, Timestamp, TradeRecord,
};
use crate::events::EventQueueError;
use crate::ledger::{LedgerError, LedgerSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal run errors. Recoverable conditions never surface here; they are
/// recorded as [`OrderOutcome`]s instead.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("event queue: {0}")]
    Queue(#[from] EventQueueError),

    #[error("order: {0}")]
    Order(#[from] OrderError),

    #[error("fill for unknown order {0}")]
    OrphanFill(OrderId),

    #[error("event limit of {limit} exceeded at {at}")]
    EventLimitExceeded { limit: usize, at: Timestamp },

    #[error("{open} reservation(s) still open at end of run")]
    ReservationLeak { open: usize },
}

/// Why a signal did not become an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Not enough unreserved cash, even after shrinking.
    InsufficientFunds,
    /// Sized to less than one lot.
    ZeroQuantity,
    /// Exit for a symbol with no open position.
    NoPosition,
    /// Strategy exit arrived while the position was still locked.
    HoldingPeriod,
    /// Entry in the direction already held, pyramiding disabled.
    AlreadyPositioned,
    /// Entry against an open position in the other direction.
    OppositePosition,
    ShortingDisabled,
    /// Reference price not usable for sizing.
    InvalidPrice,
}

/// Final state of one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Filled { fill_price: f64 },
    NotPlaced { reason: SkipReason },
    Cancelled { reason: String },
    Rejected { reason: String },
}

/// One entry per signal the engine handled, in handling order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub timestamp: Timestamp,
    pub symbol: String,
    pub signal: SignalKind,
    pub origin: SignalOrigin,
    pub order_id: Option<OrderId>,
    /// Quantity ordered (0 when nothing was placed).
    pub quantity: u64,
    pub status: OutcomeStatus,
}

impl OrderOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self.status, OutcomeStatus::Filled { .. })
    }
}

/// Equity after all events of one timestamp were resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: Timestamp,
    pub equity: f64,
    pub cash: f64,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Every fill, in dispatch order.
    pub trade_log: Vec<Fill>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_ledger: LedgerSnapshot,
    /// Completed round trips.
    pub trades: Vec<TradeRecord>,
    pub outcomes: Vec<OrderOutcome>,
    /// Every order in its terminal status.
    pub orders: Vec<Order>,
    pub events_dispatched: usize,
}

impl RunResult {
    /// Content hash of the whole result. Re-running the same config over the
    /// same data must reproduce it exactly.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("RunResult must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn final_equity(&self) -> f64 {
        self.final_ledger.equity
    }

    /// Outcomes for signals that never became orders.
    pub fn not_placed(&self) -> impl Iterator<Item = &OrderOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::NotPlaced { .. }))
    }
}
