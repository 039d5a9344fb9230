//! Orders and their lifecycle state machine.
//!
//! An order is born `Pending` and makes exactly one transition into a terminal
//! status. Every order carries the ledger reservation created together with it.

use super::ids::{OrderId, ReservationId};
use super::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Whether an order opens/extends exposure or closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PositionEffect {
    Open,
    Close,
}

/// Only market orders are simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
}

/// Order lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected { reason: String },
    Cancelled { reason: String },
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Filled => "Filled",
            Self::Rejected { .. } => "Rejected",
            Self::Cancelled { .. } => "Cancelled",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("invalid transition for order {id}: {from} → {to}")]
    InvalidTransition {
        id: OrderId,
        from: &'static str,
        to: &'static str,
    },
}

/// A single market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    /// Always positive; direction lives in `side`.
    pub quantity: u64,
    pub kind: OrderKind,
    pub effect: PositionEffect,
    pub status: OrderStatus,
    pub reservation_id: ReservationId,
    pub created_at: Timestamp,
}

impl Order {
    pub fn market(
        id: OrderId,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u64,
        effect: PositionEffect,
        reservation_id: ReservationId,
        created_at: Timestamp,
    ) -> Self {
        debug_assert!(quantity > 0, "orders must have a positive quantity");
        Self {
            id,
            symbol: symbol.into(),
            side,
            quantity,
            kind: OrderKind::Market,
            effect,
            status: OrderStatus::Pending,
            reservation_id,
            created_at,
        }
    }

    /// Quantity with the side's sign applied.
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * self.quantity as i64
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Move a pending order into a terminal status.
    pub fn transition(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        if self.status.is_terminal() || !to.is_terminal() {
            return Err(OrderError::InvalidTransition {
                id: self.id,
                from: self.status.label(),
                to: to.label(),
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn pending(side: OrderSide) -> Order {
        Order::market(
            OrderId(1),
            "SPY",
            side,
            10,
            PositionEffect::Open,
            ReservationId(1),
            ts(),
        )
    }

    #[test]
    fn signed_quantity_follows_side() {
        assert_eq!(pending(OrderSide::Buy).signed_quantity(), 10);
        assert_eq!(pending(OrderSide::Sell).signed_quantity(), -10);
    }

    #[test]
    fn pending_to_filled_once() {
        let mut order = pending(OrderSide::Buy);
        assert!(order.is_active());
        order.transition(OrderStatus::Filled).unwrap();
        assert!(!order.is_active());

        let again = order.transition(OrderStatus::Cancelled {
            reason: "late".into(),
        });
        assert!(matches!(again, Err(OrderError::InvalidTransition { .. })));
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn cannot_transition_back_to_pending() {
        let mut order = pending(OrderSide::Sell);
        assert!(order.transition(OrderStatus::Pending).is_err());
    }

    #[test]
    fn side_helpers() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.sign(), -1);
    }
}
