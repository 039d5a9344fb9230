//! Portfolio ledger — cash, reserved cash, open positions, and reservations.
//!
//! Every mutation goes through a named method and ends with an invariant check:
//!
//! - `cash >= reserved_cash >= 0`.
//! - sizing only ever sees `available_cash() = cash - reserved_cash - short_collateral`.
//! - a reservation is released exactly once, by `apply_fill` or `cancel`.
//!
//! An order's reservation is made in the same call that reads available cash,
//! so a batch of orders decided at one instant can never spend the same cash
//! twice. A breach of the cash bound or of the reservation bookkeeping is a bug in the
//! caller and panics.
//!
//! Open shorts hold collateral out of available cash: the sale proceeds plus
//! the buffered entry cost, or the buffered cost of covering at the last mark
//! if that is larger. Entries cannot spend it, so a cover always finds cash.
//! Closing orders are checked against `cash - reserved_cash` and may draw on
//! collateral.

use crate::domain::{
    Fill, OrderSide, Position, PositionEffect, ReservationId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Tolerance for floating-point comparisons on cash amounts.
pub const CASH_EPSILON: f64 = 1e-9;

/// Errors from ledger operations.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("insufficient funds: need {required:.4}, available {available:.4}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("unknown reservation {0} (already released or never made)")]
    UnknownReservation(ReservationId),

    #[error("{symbol}: quantity {quantity} against held {held} is not a valid {effect:?}")]
    NegativePosition {
        symbol: String,
        held: i64,
        quantity: i64,
        effect: PositionEffect,
    },

    #[error("invalid amount {0}")]
    InvalidAmount(f64),
}

/// Cash earmarked for a not-yet-filled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub symbol: String,
    pub side: OrderSide,
    pub effect: PositionEffect,
    pub amount: f64,
}

/// Lifetime counters for reservations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationStats {
    pub opened: usize,
    pub filled: usize,
    pub cancelled: usize,
}

impl ReservationStats {
    /// Reservations made but not yet released.
    pub fn outstanding(&self) -> usize {
        self.opened - self.filled - self.cancelled
    }
}

/// What a fill did to the book.
#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    /// The reservation released by this fill.
    pub released: Reservation,
    /// PnL realized on the reduced portion (zero for opening fills).
    pub realized_pnl: f64,
    /// The position as it stood just before it was closed out, if this fill
    /// took it to zero.
    pub closed_position: Option<Position>,
}

/// Serializable view of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub initial_capital: f64,
    pub cash: f64,
    pub reserved_cash: f64,
    pub short_collateral: f64,
    pub available_cash: f64,
    pub equity: f64,
    pub realized_pnl: f64,
    pub total_commission: f64,
    /// Sorted by symbol.
    pub positions: Vec<Position>,
    /// Sorted by reservation ID.
    pub reservations: Vec<Reservation>,
    pub reservation_stats: ReservationStats,
}

impl LedgerSnapshot {
    /// Content hash of the snapshot. Two runs over the same data and config
    /// must produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("LedgerSnapshot must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// The single owner of cash and positions during a run.
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    initial_capital: f64,
    cash: f64,
    reserved_cash: f64,
    /// Headroom on short collateral for adverse cover fills.
    cover_buffer_pct: f64,
    positions: BTreeMap<String, Position>,
    reservations: BTreeMap<ReservationId, Reservation>,
    next_reservation: u64,
    realized_pnl: f64,
    total_commission: f64,
    stats: ReservationStats,
}

impl PortfolioLedger {
    pub fn new(initial_capital: f64) -> Self {
        assert!(
            initial_capital.is_finite() && initial_capital >= 0.0,
            "initial capital must be finite and non-negative"
        );
        Self {
            initial_capital,
            cash: initial_capital,
            reserved_cash: 0.0,
            cover_buffer_pct: 0.0,
            positions: BTreeMap::new(),
            reservations: BTreeMap::new(),
            next_reservation: 0,
            realized_pnl: 0.0,
            total_commission: 0.0,
            stats: ReservationStats::default(),
        }
    }

    /// Size short collateral with `buffer_pct` of headroom, normally the
    /// reservation buffer.
    pub fn with_cover_buffer(mut self, buffer_pct: f64) -> Self {
        self.cover_buffer_pct = buffer_pct.max(0.0);
        self
    }

    // ── Read side ──────────────────────────────────────────────────────

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn reserved_cash(&self) -> f64 {
        self.reserved_cash
    }

    /// `cash - reserved_cash - short_collateral`: the only balance sizing
    /// logic may see. Negative once a short has run far against the book.
    pub fn available_cash(&self) -> f64 {
        self.unreserved_cash() - self.short_collateral()
    }

    /// `cash - reserved_cash`, the bound for closing orders.
    pub fn unreserved_cash(&self) -> f64 {
        self.cash - self.reserved_cash
    }

    /// Cash held back for covering open shorts.
    pub fn short_collateral(&self) -> f64 {
        let buffer = 1.0 + self.cover_buffer_pct;
        self.positions
            .values()
            .filter(|p| p.signed_quantity < 0)
            .map(|p| {
                let held = p.abs_quantity() as f64;
                let at_entry = held * p.avg_entry_price * (1.0 + buffer);
                let at_mark = held * p.mark_price * buffer;
                at_entry.max(at_mark)
            })
            .sum()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Signed quantity held, zero when there is no position.
    pub fn position_quantity(&self, symbol: &str) -> i64 {
        self.positions
            .get(symbol)
            .map_or(0, |p| p.signed_quantity)
    }

    /// Open positions in symbol order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    pub fn open_reservations(&self) -> usize {
        self.reservations.len()
    }

    pub fn reservation_stats(&self) -> ReservationStats {
        self.stats
    }

    /// Cash plus the marked value of every open position.
    pub fn equity(&self) -> f64 {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.market_value(p.mark_price))
                .sum::<f64>()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            initial_capital: self.initial_capital,
            cash: self.cash,
            reserved_cash: self.reserved_cash,
            short_collateral: self.short_collateral(),
            available_cash: self.available_cash(),
            equity: self.equity(),
            realized_pnl: self.realized_pnl,
            total_commission: self.total_commission,
            positions: self.positions.values().cloned().collect(),
            reservations: self.reservations.values().cloned().collect(),
            reservation_stats: self.stats,
        }
    }

    // ── Reservations ───────────────────────────────────────────────────

    /// Reserve `price * quantity * (1 + buffer_pct)` for an opening order.
    ///
    /// Reads available cash and books the reservation in one step. Fails
    /// without side effects when the estimate exceeds available cash.
    pub fn reserve(
        &mut self,
        symbol: &str,
        side: OrderSide,
        price: f64,
        quantity: f64,
        buffer_pct: f64,
    ) -> Result<ReservationId, LedgerError> {
        if !(price.is_finite() && price > 0.0) {
            return Err(LedgerError::InvalidAmount(price));
        }
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(LedgerError::InvalidAmount(quantity));
        }
        let estimated_cost = price * quantity * (1.0 + buffer_pct);
        self.reserve_amount(symbol, side, estimated_cost, PositionEffect::Open)
    }

    /// Reserve an explicit amount. Closing orders use this with an estimate
    /// that covers only what the close actually consumes, and are checked
    /// against unreserved cash rather than available cash.
    pub fn reserve_amount(
        &mut self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
        effect: PositionEffect,
    ) -> Result<ReservationId, LedgerError> {
        if !(amount.is_finite() && amount >= 0.0) {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let available = self.spendable(effect);
        // Sizing against all available cash can overshoot it by rounding.
        let amount = if amount > available && amount - available <= self.tolerance() {
            available.max(0.0)
        } else {
            amount
        };
        if amount > available {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        self.next_reservation += 1;
        let id = ReservationId(self.next_reservation);
        self.reservations.insert(
            id,
            Reservation {
                id,
                symbol: symbol.to_string(),
                side,
                effect,
                amount,
            },
        );
        self.reserved_cash += amount;
        self.stats.opened += 1;
        debug!(%id, symbol, ?side, ?effect, amount, available = self.available_cash(), "reserved");

        self.assert_invariants();
        Ok(id)
    }

    /// Release a reservation without economic effect.
    pub fn cancel(&mut self, id: ReservationId) -> Result<Reservation, LedgerError> {
        let reservation = self.release(id)?;
        self.stats.cancelled += 1;
        debug!(%id, symbol = %reservation.symbol, amount = reservation.amount, "reservation cancelled");

        self.assert_invariants();
        Ok(reservation)
    }

    fn release(&mut self, id: ReservationId) -> Result<Reservation, LedgerError> {
        let reservation = self
            .reservations
            .remove(&id)
            .ok_or(LedgerError::UnknownReservation(id))?;
        self.reserved_cash -= reservation.amount;
        if self.reservations.is_empty() {
            // Drop accumulated rounding once nothing is outstanding.
            self.reserved_cash = 0.0;
        }
        Ok(reservation)
    }

    // ── Fills ──────────────────────────────────────────────────────────

    /// Check that an order of `signed_quantity` with the given effect is legal
    /// against the current position. Positions never cross through zero in a
    /// single fill, and a close needs something to close.
    pub fn check_order(
        &self,
        symbol: &str,
        signed_quantity: i64,
        effect: PositionEffect,
    ) -> Result<(), LedgerError> {
        let held = self.position_quantity(symbol);
        let legal = match effect {
            PositionEffect::Open => {
                signed_quantity != 0 && (held == 0 || held.signum() == signed_quantity.signum())
            }
            PositionEffect::Close => {
                held != 0
                    && signed_quantity.signum() == -held.signum()
                    && signed_quantity.abs() <= held.abs()
            }
        };
        if legal {
            Ok(())
        } else {
            Err(LedgerError::NegativePosition {
                symbol: symbol.to_string(),
                held,
                quantity: signed_quantity,
                effect,
            })
        }
    }

    /// Release the reservation and apply the fill's economics.
    ///
    /// Validation happens before any mutation: a rejected fill leaves the
    /// ledger (including the reservation) untouched. A fill costing more than
    /// its reservation plus the cash the order could otherwise draw on is
    /// `InsufficientFunds`.
    pub fn apply_fill(
        &mut self,
        id: ReservationId,
        fill: &Fill,
    ) -> Result<FillOutcome, LedgerError> {
        let (effect, reserved) = self
            .reservations
            .get(&id)
            .map(|r| (r.effect, r.amount))
            .ok_or(LedgerError::UnknownReservation(id))?;
        if !(fill.fill_price.is_finite() && fill.fill_price > 0.0) {
            return Err(LedgerError::InvalidAmount(fill.fill_price));
        }
        if !(fill.commission.is_finite() && fill.commission >= 0.0) {
            return Err(LedgerError::InvalidAmount(fill.commission));
        }
        self.check_order(&fill.symbol, fill.quantity, effect)?;
        let covered = reserved + self.spendable(effect);
        if fill.cash_outflow() > covered + self.tolerance() {
            return Err(LedgerError::InsufficientFunds {
                required: fill.cash_outflow(),
                available: covered,
            });
        }

        let released = self.release(id)?;
        self.stats.filled += 1;
        self.cash -= fill.cash_outflow();
        self.total_commission += fill.commission;

        let (realized_pnl, closed_position) =
            self.apply_to_position(fill.symbol.as_str(), fill.quantity, fill.fill_price, fill.timestamp);
        self.realized_pnl += realized_pnl;

        debug!(
            %id,
            order = %fill.order_id,
            symbol = %fill.symbol,
            quantity = fill.quantity,
            price = fill.fill_price,
            commission = fill.commission,
            cash = self.cash,
            "fill applied"
        );

        self.assert_invariants();
        Ok(FillOutcome {
            released,
            realized_pnl,
            closed_position,
        })
    }

    fn apply_to_position(
        &mut self,
        symbol: &str,
        quantity: i64,
        price: f64,
        at: Timestamp,
    ) -> (f64, Option<Position>) {
        let Some(pos) = self.positions.get_mut(symbol) else {
            self.positions
                .insert(symbol.to_string(), Position::open(symbol, quantity, price, at));
            return (0.0, None);
        };

        let held = pos.signed_quantity;
        if held.signum() == quantity.signum() {
            // Same direction: weighted average entry.
            let total = held + quantity;
            pos.avg_entry_price = (pos.avg_entry_price * held.abs() as f64
                + price * quantity.abs() as f64)
                / total.abs() as f64;
            pos.signed_quantity = total;
            pos.unrealized_pnl = pos.unrealized_pnl_at(pos.mark_price);
            return (0.0, None);
        }

        // Reducing: realize on the closed portion at the old average.
        let closed = quantity.abs().min(held.abs());
        let realized = closed as f64 * (price - pos.avg_entry_price) * held.signum() as f64;
        pos.realized_pnl += realized;
        pos.signed_quantity = held + quantity;

        if pos.signed_quantity != 0 {
            pos.unrealized_pnl = pos.unrealized_pnl_at(pos.mark_price);
            return (realized, None);
        }

        let closed_position = self.positions.remove(symbol).map(|mut snapshot| {
            snapshot.signed_quantity = held;
            snapshot.unrealized_pnl = 0.0;
            snapshot
        });
        (realized, closed_position)
    }

    // ── Marking ────────────────────────────────────────────────────────

    /// Mark a held symbol at `price` and count one more bar held.
    ///
    /// Non-finite or non-positive prices (void bars) still count the bar but
    /// leave the marks untouched.
    pub fn mark_to_market(&mut self, symbol: &str, price: f64) -> Option<&Position> {
        let pos = self.positions.get_mut(symbol)?;
        pos.tick_bar();
        if price.is_finite() && price > 0.0 {
            pos.update_mark(price);
        }
        Some(pos)
    }

    // ── Invariants ─────────────────────────────────────────────────────

    /// Whether cash covers every reservation and `reserved_cash` matches the
    /// open reservations.
    pub fn invariants_hold(&self) -> bool {
        let tolerance = self.tolerance();
        let booked: f64 = self.reservations.values().map(|r| r.amount).sum();
        self.reserved_cash >= -tolerance
            && self.cash + tolerance >= self.reserved_cash
            && (booked - self.reserved_cash).abs() <= tolerance
    }

    fn spendable(&self, effect: PositionEffect) -> f64 {
        match effect {
            PositionEffect::Open => self.available_cash(),
            PositionEffect::Close => self.unreserved_cash(),
        }
    }

    /// Rounding noise allowed in cash comparisons, proportional to the account.
    fn tolerance(&self) -> f64 {
        CASH_EPSILON * (1.0 + self.initial_capital)
    }

    fn assert_invariants(&self) {
        assert!(
            self.invariants_hold(),
            "ledger invariant violated: cash={}, reserved_cash={}, open reservations={}",
            self.cash,
            self.reserved_cash,
            self.reservations.len()
        );
    }
}
