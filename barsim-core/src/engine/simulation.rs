//! Simulation engine — the single writer of the ledger.
//!
//! Bars are fed into the event queue one at a time. Each market event marks
//! the symbol's position, runs the exit policy, and asks the strategy for
//! signals. The signals are released into the queue one by one, and each is
//! resolved completely (size → reserve → order → fill → apply) before the next
//! is released. A later signal therefore always sees the reservations and
//! fills of every earlier one, and no two orders can spend the same cash.

use crate::config::{ConfigError, SimConfig};
use crate::domain::{
    Bar, ExitReason, Fill, IdGen, Order, OrderId, OrderSide, OrderStatus, Position,
    PositionEffect, PositionSide, ReservationId, Signal, SignalKind, Timestamp, TradeRecord,
};
use crate::events::{EventPayload, EventQueue};
use crate::exit_policy::{ExitPolicyEngine, ExitState};
use crate::fill_model::{CostFillModel, FillModel};
use crate::ledger::{FillOutcome, LedgerError, PortfolioLedger};
use crate::sizers::PositionSizer;
use crate::strategy::{BarHistory, Strategy};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, warn};

use super::result::{
    EquityPoint, OrderOutcome, OutcomeStatus, RunResult, SimError, SkipReason,
};

/// Round a sized quantity down to a whole number of lots.
pub fn round_to_lot(quantity: f64, lot_size: u64) -> u64 {
    if !(quantity.is_finite() && quantity > 0.0) || lot_size == 0 {
        return 0;
    }
    let lots = (quantity / lot_size as f64).floor();
    (lots as u64).saturating_mul(lot_size)
}

/// An order between submission and its terminal status.
#[derive(Debug)]
struct InFlight {
    order: Order,
    signal: Signal,
}

/// How an order ended without a fill.
#[derive(Debug, Clone)]
enum Termination {
    /// The fill model could not fill it.
    Cancelled(String),
    /// The ledger refused the fill.
    Rejected(String),
}

impl Termination {
    fn order_status(&self) -> OrderStatus {
        match self {
            Self::Cancelled(reason) => OrderStatus::Cancelled {
                reason: reason.clone(),
            },
            Self::Rejected(reason) => OrderStatus::Rejected {
                reason: reason.clone(),
            },
        }
    }

    fn outcome_status(self) -> OutcomeStatus {
        match self {
            Self::Cancelled(reason) => OutcomeStatus::Cancelled { reason },
            Self::Rejected(reason) => OutcomeStatus::Rejected { reason },
        }
    }
}

/// Orchestrates one deterministic run.
#[derive(Debug)]
pub struct SimulationEngine {
    config: SimConfig,
    strategy: Box<dyn Strategy>,
    sizer: Box<dyn PositionSizer>,
    fill_model: Box<dyn FillModel>,

    ledger: PortfolioLedger,
    exits: ExitPolicyEngine,
    queue: EventQueue,
    history: BarHistory,
    ids: IdGen,
    /// Signals of the current market event not yet released into the queue.
    backlog: VecDeque<Signal>,
    in_flight: BTreeMap<OrderId, InFlight>,
    /// Commission paid on the fills that built each open position.
    entry_commission: BTreeMap<String, f64>,

    trade_log: Vec<Fill>,
    orders: Vec<Order>,
    outcomes: Vec<OrderOutcome>,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,
}

impl SimulationEngine {
    /// Assemble an engine from explicit components. `config` is validated.
    pub fn new(
        config: SimConfig,
        strategy: Box<dyn Strategy>,
        sizer: Box<dyn PositionSizer>,
        fill_model: Box<dyn FillModel>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ledger: PortfolioLedger::new(config.initial_capital)
                .with_cover_buffer(config.reservation_buffer_pct),
            exits: ExitPolicyEngine::new(config.exits.clone()),
            config,
            strategy,
            sizer,
            fill_model,
            queue: EventQueue::new(),
            history: BarHistory::new(),
            ids: IdGen::default(),
            backlog: VecDeque::new(),
            in_flight: BTreeMap::new(),
            entry_commission: BTreeMap::new(),
            trade_log: Vec::new(),
            orders: Vec::new(),
            outcomes: Vec::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        })
    }

    /// Validate `config` and build the configured sizer and fill model.
    pub fn from_config(config: SimConfig, strategy: Box<dyn Strategy>) -> Result<Self, ConfigError> {
        let sizer = config.sizer.build();
        let fill_model = Box::new(CostFillModel::new(&config.fill, config.commission_rate));
        Self::new(config, strategy, sizer, fill_model)
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    /// Replay `bars` and return the result.
    ///
    /// Bars are processed in `(timestamp, symbol)` order regardless of input
    /// order.
    pub fn run(mut self, mut bars: Vec<Bar>) -> Result<RunResult, SimError> {
        bars.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        info!(
            bars = bars.len(),
            initial_capital = self.config.initial_capital,
            strategy = self.strategy.name(),
            sizer = self.sizer.name(),
            fill_model = self.fill_model.name(),
            "simulation started"
        );

        let mut feed = bars.into_iter();
        let mut step: Option<Timestamp> = None;

        loop {
            if self.queue.is_empty() {
                if let Some(signal) = self.backlog.pop_front() {
                    self.queue.push(EventPayload::Signal(signal))?;
                } else if let Some(bar) = feed.next() {
                    if let Some(ts) = step.filter(|ts| *ts != bar.timestamp) {
                        self.record_equity(ts);
                    }
                    step = Some(bar.timestamp);
                    self.queue.push(EventPayload::Market(bar))?;
                } else {
                    break;
                }
            }

            let Some(event) = self.queue.pop() else {
                break;
            };
            if self.queue.dispatched() > self.config.max_events {
                return Err(SimError::EventLimitExceeded {
                    limit: self.config.max_events,
                    at: event.timestamp,
                });
            }

            match event.payload {
                EventPayload::Market(bar) => self.on_market(bar),
                EventPayload::Signal(signal) => self.on_signal(signal)?,
                EventPayload::Order(order) => self.on_order(order)?,
                EventPayload::Fill(fill) => self.on_fill(fill)?,
            }
        }

        if let Some(ts) = step {
            self.record_equity(ts);
        }

        let open = self.ledger.open_reservations();
        if open > 0 || !self.in_flight.is_empty() {
            return Err(SimError::ReservationLeak { open });
        }

        let final_ledger = self.ledger.snapshot();
        info!(
            events = self.queue.dispatched(),
            fills = self.trade_log.len(),
            trades = self.trades.len(),
            equity = final_ledger.equity,
            "simulation finished"
        );

        Ok(RunResult {
            trade_log: self.trade_log,
            equity_curve: self.equity_curve,
            final_ledger,
            trades: self.trades,
            outcomes: self.outcomes,
            orders: self.orders,
            events_dispatched: self.queue.dispatched(),
        })
    }

    // ── Market ─────────────────────────────────────────────────────────

    fn on_market(&mut self, bar: Bar) {
        let symbol = bar.symbol.clone();
        let timestamp = bar.timestamp;
        let close = bar.close;
        let tradable = bar.is_tradable();
        self.history.push(bar);

        self.ledger.mark_to_market(&symbol, close);

        // Strategy exits are technical reversals for the exit policy; entries
        // queue behind any exit this bar produces.
        let signals = self
            .strategy
            .generate_signals(&symbol, self.history.history(&symbol));
        let mut technical_reversal = false;
        let mut entries = Vec::new();
        for signal in signals {
            if signal.is_entry() {
                entries.push(signal);
            } else if self.ledger.position(&symbol).is_some() {
                technical_reversal = true;
            } else {
                debug!(%symbol, %timestamp, "exit signal with no open position ignored");
                self.record_skip(&signal, SkipReason::NoPosition);
            }
        }

        if tradable {
            if let Some(position) = self.ledger.position(&symbol) {
                match self.exits.evaluate(position, technical_reversal) {
                    Some(reason) => self
                        .backlog
                        .push_back(Signal::policy_exit(&symbol, timestamp, close, reason)),
                    None if technical_reversal
                        && self.exits.state(&symbol) == Some(ExitState::Locked) =>
                    {
                        debug!(%symbol, bars_held = position.bars_held, "technical exit held back by holding period");
                        let signal = Signal::exit(&symbol, timestamp, close);
                        self.record_skip(&signal, SkipReason::HoldingPeriod);
                    }
                    None => {}
                }
            }
        }

        self.backlog.extend(entries);
    }

    // ── Signals ────────────────────────────────────────────────────────

    fn on_signal(&mut self, signal: Signal) -> Result<(), SimError> {
        match signal.kind {
            SignalKind::Exit => self.place_exit(signal),
            SignalKind::Long | SignalKind::Short => self.place_entry(signal),
        }
    }

    fn place_entry(&mut self, signal: Signal) -> Result<(), SimError> {
        let Some(side) = signal.kind.entry_side() else {
            return Ok(());
        };
        if side == OrderSide::Sell && !self.config.allow_short {
            self.record_skip(&signal, SkipReason::ShortingDisabled);
            return Ok(());
        }

        let held = self.ledger.position_quantity(&signal.symbol);
        if held != 0 {
            let reason = if held.signum() != side.sign() {
                Some(SkipReason::OppositePosition)
            } else if !self.config.allow_pyramiding {
                Some(SkipReason::AlreadyPositioned)
            } else {
                None
            };
            if let Some(reason) = reason {
                debug!(symbol = %signal.symbol, held, ?reason, "entry not placed");
                self.record_skip(&signal, reason);
                return Ok(());
            }
        }

        let price = self.execution_price(&signal);
        if !(price.is_finite() && price > 0.0) {
            self.record_skip(&signal, SkipReason::InvalidPrice);
            return Ok(());
        }

        let available = self.ledger.available_cash();
        let wanted = self.sizer.size(&signal, available, price);
        if !(wanted.is_finite() && wanted > 0.0) {
            self.record_skip(&signal, SkipReason::ZeroQuantity);
            return Ok(());
        }

        let Some((reservation, quantity)) = self.reserve_entry(&signal, side, price, wanted)? else {
            return Ok(());
        };
        self.submit(signal, side, quantity, PositionEffect::Open, reservation)
    }

    /// Reserve cash for an entry and settle its lot-rounded quantity.
    ///
    /// On `InsufficientFunds` the quantity is shrunk once to what available
    /// cash covers at the buffered price. Returns `None` (outcome recorded)
    /// when nothing can be placed.
    fn reserve_entry(
        &mut self,
        signal: &Signal,
        side: OrderSide,
        price: f64,
        wanted: f64,
    ) -> Result<Option<(ReservationId, u64)>, SimError> {
        let buffer = self.config.reservation_buffer_pct;
        let lot = self.config.lot_size;

        let (reservation, sized) =
            match self.ledger.reserve(&signal.symbol, side, price, wanted, buffer) {
                Ok(id) => (id, wanted),
                Err(LedgerError::InsufficientFunds {
                    required,
                    available,
                }) => {
                    let affordable = available / (price * (1.0 + buffer));
                    let shrunk = round_to_lot(affordable, lot) as f64;
                    warn!(
                        symbol = %signal.symbol,
                        required,
                        available,
                        wanted,
                        shrunk,
                        "reservation denied, shrinking"
                    );
                    if shrunk <= 0.0 {
                        self.record_skip(signal, SkipReason::InsufficientFunds);
                        return Ok(None);
                    }
                    match self.ledger.reserve(&signal.symbol, side, price, shrunk, buffer) {
                        Ok(id) => (id, shrunk),
                        Err(LedgerError::InsufficientFunds { .. }) => {
                            self.record_skip(signal, SkipReason::InsufficientFunds);
                            return Ok(None);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(LedgerError::InvalidAmount(_)) => {
                    self.record_skip(signal, SkipReason::ZeroQuantity);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

        let quantity = round_to_lot(sized, lot);
        if quantity == 0 {
            self.ledger.cancel(reservation)?;
            debug!(symbol = %signal.symbol, sized, lot, "sized below one lot");
            self.record_skip(signal, SkipReason::ZeroQuantity);
            return Ok(None);
        }

        let signed = side.sign() * quantity as i64;
        if self
            .ledger
            .check_order(&signal.symbol, signed, PositionEffect::Open)
            .is_err()
        {
            self.ledger.cancel(reservation)?;
            self.record_skip(signal, SkipReason::OppositePosition);
            return Ok(None);
        }
        Ok(Some((reservation, quantity)))
    }

    fn place_exit(&mut self, signal: Signal) -> Result<(), SimError> {
        let Some(position) = self.ledger.position(&signal.symbol).cloned() else {
            debug!(symbol = %signal.symbol, "exit signal with no open position ignored");
            self.record_skip(&signal, SkipReason::NoPosition);
            return Ok(());
        };

        let quantity = position.abs_quantity();
        let side = match position.side() {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
            PositionSide::Flat => return Ok(()),
        };

        // Selling to close only needs its commission covered; buying to cover
        // needs the full cost.
        let notional = self.execution_price(&signal) * quantity as f64;
        let buffer = 1.0 + self.config.reservation_buffer_pct;
        let amount = match side {
            OrderSide::Sell => notional * self.config.commission_rate * buffer,
            OrderSide::Buy => notional * buffer,
        };

        match self
            .ledger
            .reserve_amount(&signal.symbol, side, amount, PositionEffect::Close)
        {
            Ok(reservation) => {
                self.submit(signal, side, quantity, PositionEffect::Close, reservation)
            }
            Err(err @ (LedgerError::InsufficientFunds { .. } | LedgerError::InvalidAmount(_))) => {
                warn!(symbol = %signal.symbol, %err, "exit not placed");
                self.record_skip(&signal, SkipReason::InsufficientFunds);
                self.exits.reopen(&position);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The close the order will fill against. The signal's reference price
    /// can be stale, so it is only used before the symbol has a bar.
    fn execution_price(&self, signal: &Signal) -> f64 {
        self.history
            .latest_bar(&signal.symbol)
            .map_or(signal.reference_price, |bar| bar.close)
    }

    fn submit(
        &mut self,
        signal: Signal,
        side: OrderSide,
        quantity: u64,
        effect: PositionEffect,
        reservation: ReservationId,
    ) -> Result<(), SimError> {
        let id = self.ids.next_order_id();
        let order = Order::market(
            id,
            signal.symbol.as_str(),
            side,
            quantity,
            effect,
            reservation,
            signal.timestamp,
        );
        debug!(%id, symbol = %order.symbol, ?side, quantity, ?effect, %reservation, "order submitted");
        self.queue.push(EventPayload::Order(order.clone()))?;
        self.in_flight.insert(id, InFlight { order, signal });
        Ok(())
    }

    // ── Orders & fills ─────────────────────────────────────────────────

    fn on_order(&mut self, order: Order) -> Result<(), SimError> {
        let fill = self
            .history
            .latest_bar(&order.symbol)
            .and_then(|bar| self.fill_model.execute(&order, bar));
        match fill {
            Some(fill) => {
                self.queue.push(EventPayload::Fill(fill))?;
                Ok(())
            }
            None => self.terminate(
                order.id,
                Termination::Cancelled("no fill against current bar".into()),
            ),
        }
    }

    fn on_fill(&mut self, fill: Fill) -> Result<(), SimError> {
        let reservation = self
            .in_flight
            .get(&fill.order_id)
            .ok_or(SimError::OrphanFill(fill.order_id))?
            .order
            .reservation_id;

        let outcome = match self.ledger.apply_fill(reservation, &fill) {
            Ok(outcome) => outcome,
            Err(
                err @ (LedgerError::NegativePosition { .. }
                | LedgerError::InsufficientFunds { .. }),
            ) => {
                warn!(order = %fill.order_id, %err, "fill rejected by ledger");
                return self.terminate(fill.order_id, Termination::Rejected(err.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let InFlight { mut order, signal } = self
            .in_flight
            .remove(&fill.order_id)
            .ok_or(SimError::OrphanFill(fill.order_id))?;
        order.transition(OrderStatus::Filled)?;

        match order.effect {
            PositionEffect::Open => {
                *self.entry_commission.entry(fill.symbol.clone()).or_default() += fill.commission;
            }
            PositionEffect::Close => self.close_out(&fill, &outcome, signal.exit_reason()),
        }

        self.outcomes.push(OrderOutcome {
            timestamp: signal.timestamp,
            symbol: signal.symbol,
            signal: signal.kind,
            origin: signal.origin,
            order_id: Some(order.id),
            quantity: order.quantity,
            status: OutcomeStatus::Filled {
                fill_price: fill.fill_price,
            },
        });
        self.orders.push(order);
        self.trade_log.push(fill);
        Ok(())
    }

    fn close_out(&mut self, fill: &Fill, outcome: &FillOutcome, reason: Option<ExitReason>) {
        let Some(closed) = &outcome.closed_position else {
            return;
        };
        self.exits.on_position_closed(&fill.symbol);
        let entry_commission = self.entry_commission.remove(&fill.symbol).unwrap_or(0.0);
        let trade = trade_record(closed, fill, outcome.realized_pnl, entry_commission, reason);
        info!(
            symbol = %trade.symbol,
            side = ?trade.side,
            quantity = trade.quantity,
            net_pnl = trade.net_pnl,
            bars_held = trade.bars_held,
            reason = ?trade.exit_reason,
            "trade closed"
        );
        self.trades.push(trade);
    }

    /// Move an in-flight order to a non-fill terminal status and release its
    /// reservation.
    fn terminate(&mut self, id: OrderId, how: Termination) -> Result<(), SimError> {
        let InFlight { mut order, signal } = self
            .in_flight
            .remove(&id)
            .ok_or(SimError::OrphanFill(id))?;
        self.ledger.cancel(order.reservation_id)?;
        order.transition(how.order_status())?;

        if order.effect == PositionEffect::Close {
            if let Some(position) = self.ledger.position(&order.symbol) {
                self.exits.reopen(position);
            }
        }

        let status = how.outcome_status();
        debug!(%id, symbol = %order.symbol, ?status, "order terminated without fill");
        self.outcomes.push(OrderOutcome {
            timestamp: signal.timestamp,
            symbol: signal.symbol,
            signal: signal.kind,
            origin: signal.origin,
            order_id: Some(order.id),
            quantity: order.quantity,
            status,
        });
        self.orders.push(order);
        Ok(())
    }

    // ── Bookkeeping ────────────────────────────────────────────────────

    fn record_skip(&mut self, signal: &Signal, reason: SkipReason) {
        self.outcomes.push(OrderOutcome {
            timestamp: signal.timestamp,
            symbol: signal.symbol.clone(),
            signal: signal.kind,
            origin: signal.origin,
            order_id: None,
            quantity: 0,
            status: OutcomeStatus::NotPlaced { reason },
        });
    }

    fn record_equity(&mut self, timestamp: Timestamp) {
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity: self.ledger.equity(),
            cash: self.ledger.cash(),
        });
    }
}

fn trade_record(
    closed: &Position,
    fill: &Fill,
    gross_pnl: f64,
    entry_commission: f64,
    exit_reason: Option<ExitReason>,
) -> TradeRecord {
    let commission = entry_commission + fill.commission;
    TradeRecord {
        symbol: closed.symbol.clone(),
        side: closed.side(),
        entry_timestamp: closed.entry_timestamp,
        entry_price: closed.avg_entry_price,
        exit_timestamp: fill.timestamp,
        exit_price: fill.fill_price,
        quantity: closed.abs_quantity(),
        gross_pnl,
        commission,
        net_pnl: gross_pnl - commission,
        bars_held: closed.bars_held,
        exit_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExitRules;
    use crate::fill_model::FillModelConfig;
    use crate::sizers::FixedSizer;
    use crate::strategy::ScriptedStrategy;
    use chrono::NaiveDate;

    fn day(d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn make_bar(symbol: &str, d: u32, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            timestamp: day(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10_000,
        }
    }

    fn frictionless(initial_capital: f64, exits: ExitRules) -> SimConfig {
        SimConfig {
            initial_capital,
            commission_rate: 0.0,
            reservation_buffer_pct: 0.0,
            exits,
            fill: FillModelConfig {
                slippage_bps: 0.0,
                jitter_bps: 0.0,
                seed: 0,
            },
            ..SimConfig::default()
        }
    }

    fn engine(config: SimConfig, strategy: ScriptedStrategy, shares: f64) -> SimulationEngine {
        SimulationEngine::new(
            config,
            Box::new(strategy),
            Box::new(FixedSizer::shares(shares)),
            Box::new(CostFillModel::frictionless()),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_config_that_cannot_cover_costs() {
        let config = SimConfig {
            commission_rate: 0.001,
            ..frictionless(10_000.0, ExitRules::disabled())
        };
        let err = SimulationEngine::new(
            config,
            Box::new(ScriptedStrategy::new()),
            Box::new(FixedSizer::shares(1.0)),
            Box::new(CostFillModel::frictionless()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "reservation_buffer_pct",
                ..
            }
        ));
    }

    #[test]
    fn lot_rounding_floors() {
        assert_eq!(round_to_lot(7.9, 1), 7);
        assert_eq!(round_to_lot(249.0, 100), 200);
        assert_eq!(round_to_lot(0.99, 1), 0);
        assert_eq!(round_to_lot(f64::NAN, 1), 0);
        assert_eq!(round_to_lot(-3.0, 1), 0);
    }

    #[test]
    fn entry_then_strategy_exit_round_trip() {
        let strategy = ScriptedStrategy::new()
            .at(day(2), "SPY", SignalKind::Long)
            .at(day(4), "SPY", SignalKind::Exit);
        let bars = vec![
            make_bar("SPY", 2, 100.0),
            make_bar("SPY", 3, 101.0),
            make_bar("SPY", 4, 102.0),
        ];
        let result = engine(frictionless(10_000.0, ExitRules::disabled()), strategy, 10.0)
            .run(bars)
            .unwrap();

        assert_eq!(result.trade_log.len(), 2);
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert!((trade.net_pnl - 20.0).abs() < 1e-9);
        assert_eq!(trade.exit_reason, Some(ExitReason::TechnicalReversal));
        assert!((result.final_ledger.cash - 10_020.0).abs() < 1e-9);
        assert!(result.final_ledger.positions.is_empty());
        assert_eq!(result.equity_curve.len(), 3);
    }

    #[test]
    fn void_bar_cancels_order_and_reservation() {
        let strategy = ScriptedStrategy::new().at(day(2), "SPY", SignalKind::Long);
        let mut bar = make_bar("SPY", 2, 100.0);
        bar.volume = 0;
        let result = engine(frictionless(10_000.0, ExitRules::disabled()), strategy, 10.0)
            .run(vec![bar])
            .unwrap();

        assert!(result.trade_log.is_empty());
        assert_eq!(result.final_ledger.reserved_cash, 0.0);
        assert!(matches!(
            result.outcomes[0].status,
            OutcomeStatus::Cancelled { .. }
        ));
        assert!(matches!(result.orders[0].status, OrderStatus::Cancelled { .. }));
    }

    #[test]
    fn exit_without_position_is_a_logged_no_op() {
        let strategy = ScriptedStrategy::new().at(day(2), "SPY", SignalKind::Exit);
        let result = engine(frictionless(10_000.0, ExitRules::disabled()), strategy, 10.0)
            .run(vec![make_bar("SPY", 2, 100.0)])
            .unwrap();

        assert!(result.orders.is_empty());
        assert_eq!(
            result.outcomes[0].status,
            OutcomeStatus::NotPlaced {
                reason: SkipReason::NoPosition
            }
        );
    }

    #[test]
    fn pyramiding_gate() {
        let strategy = ScriptedStrategy::new()
            .at(day(2), "SPY", SignalKind::Long)
            .at(day(3), "SPY", SignalKind::Long)
            .at(day(3), "SPY", SignalKind::Short);
        let bars = vec![make_bar("SPY", 2, 100.0), make_bar("SPY", 3, 100.0)];
        let result = engine(frictionless(10_000.0, ExitRules::disabled()), strategy, 10.0)
            .run(bars)
            .unwrap();

        let skips: Vec<_> = result
            .not_placed()
            .map(|o| o.status.clone())
            .collect();
        assert_eq!(
            skips,
            vec![
                OutcomeStatus::NotPlaced {
                    reason: SkipReason::AlreadyPositioned
                },
                OutcomeStatus::NotPlaced {
                    reason: SkipReason::OppositePosition
                },
            ]
        );
        assert_eq!(result.final_ledger.positions[0].signed_quantity, 10);
    }

    #[test]
    fn event_limit_aborts_run() {
        let strategy = ScriptedStrategy::new().at(day(2), "SPY", SignalKind::Long);
        let config = SimConfig {
            max_events: 3,
            ..frictionless(10_000.0, ExitRules::disabled())
        };
        // market, signal, order, fill → the fourth dispatch trips the guard.
        let err = engine(config, strategy, 10.0)
            .run(vec![make_bar("SPY", 2, 100.0)])
            .unwrap_err();
        assert!(matches!(err, SimError::EventLimitExceeded { limit: 3, .. }));
    }
}
