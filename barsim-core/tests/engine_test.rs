//! Integration tests for the simulation engine.
//!
//! Tests:
//! 1. Same-instant batch sizing against available cash (the 1297.29 case)
//! 2. Exit policy: stops bypass the holding period, take-profit waits
//! 3. Shorts: stopped out on a rally, cover cash kept from later entries
//! 4. Determinism: identical inputs give identical fingerprints
//! 5. Equity accounting: equity == cash + positions at every step
//! 6. Fills priced off the current bar, not the signal's reference price

use barsim_core::domain::{
    Bar, ExitReason, Fill, Order, OrderStatus, Signal, SignalKind, Timestamp,
};
use barsim_core::engine::{OutcomeStatus, SimulationEngine, SkipReason};
use barsim_core::fill_model::{CostFillModel, FillModel, FillModelConfig};
use barsim_core::sizers::{CashFractionSizer, FixedSizer, PositionSizer, SizerConfig};
use barsim_core::strategy::{MaCrossover, ScriptedStrategy, Strategy};
use barsim_core::{ExitRules, RunResult, SimConfig};
use chrono::NaiveDate;

// ── Helpers ──────────────────────────────────────────────────────────

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

fn frictionless(initial_capital: f64) -> SimConfig {
    SimConfig {
        initial_capital,
        commission_rate: 0.0,
        reservation_buffer_pct: 0.0,
        fill: FillModelConfig {
            slippage_bps: 0.0,
            jitter_bps: 0.0,
            seed: 0,
        },
        ..SimConfig::default()
    }
}

fn run_scripted(config: SimConfig, strategy: ScriptedStrategy, shares: f64, bars: Vec<Bar>) -> RunResult {
    SimulationEngine::new(
        config,
        Box::new(strategy),
        Box::new(FixedSizer::shares(shares)),
        Box::new(CostFillModel::frictionless()),
    )
    .unwrap()
    .run(bars)
    .unwrap()
}

// ── 1. Same-instant batch ────────────────────────────────────────────

/// Emits a fixed batch of signals on the trigger symbol's bar.
#[derive(Debug)]
struct Batch {
    trigger: &'static str,
    at: Timestamp,
    signals: Vec<(&'static str, SignalKind, f64)>,
}

impl Strategy for Batch {
    fn name(&self) -> &str {
        "batch"
    }

    fn generate_signals(&self, symbol: &str, history: &[Bar]) -> Vec<Signal> {
        match history.last() {
            Some(bar) if symbol == self.trigger && bar.timestamp == self.at => self
                .signals
                .iter()
                .map(|&(s, kind, price)| Signal::new(s, kind, bar.timestamp, price))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Wants a fixed share count per (symbol, reference price), capped at what
/// the available cash buys.
#[derive(Debug)]
struct Wants(Vec<(&'static str, f64, f64)>);

impl PositionSizer for Wants {
    fn size(&self, signal: &Signal, available_cash: f64, price: f64) -> f64 {
        let wanted = self
            .0
            .iter()
            .find(|(s, p, _)| *s == signal.symbol && (*p - signal.reference_price).abs() < 1e-9)
            .map_or(0.0, |&(_, _, shares)| shares);
        wanted.min((available_cash / price).max(0.0))
    }

    fn name(&self) -> &str {
        "wants"
    }
}

fn batch_scenario(buffer: f64) -> RunResult {
    // Both bars share day 2; GOOGL sorts after AAPL, so its bar triggers the
    // batch once both prices are known.
    let bars = vec![make_bar("AAPL", 2, 100.14), make_bar("GOOGL", 2, 100.13)];
    let strategy = Batch {
        trigger: "GOOGL",
        at: day(2),
        signals: vec![
            ("GOOGL", SignalKind::Long, 100.13),
            ("AAPL", SignalKind::Long, 100.14),
            ("AAPL", SignalKind::Long, 100.11),
        ],
    };
    let sizer = Wants(vec![
        ("GOOGL", 100.13, 8.0),
        ("AAPL", 100.14, 4.0),
        ("AAPL", 100.11, 2.0),
    ]);
    let config = SimConfig {
        reservation_buffer_pct: buffer,
        allow_pyramiding: true,
        exits: ExitRules::disabled(),
        ..frictionless(1297.29)
    };
    SimulationEngine::new(
        config,
        Box::new(strategy),
        Box::new(sizer),
        Box::new(CostFillModel::frictionless()),
    )
    .unwrap()
    .run(bars)
    .unwrap()
}

#[test]
fn third_signal_sizes_against_available_cash() {
    let result = batch_scenario(0.0);

    let quantities: Vec<u64> = result.outcomes.iter().map(|o| o.quantity).collect();
    assert_eq!(quantities, vec![8, 4, 0]);
    assert!(result.outcomes[0].is_filled());
    assert!(result.outcomes[1].is_filled());
    assert_eq!(
        result.outcomes[2].status,
        OutcomeStatus::NotPlaced {
            reason: SkipReason::ZeroQuantity
        }
    );

    let expected_cash = 1297.29 - 8.0 * 100.13 - 4.0 * 100.14;
    assert!((result.final_ledger.cash - expected_cash).abs() < 1e-9);
    assert!((result.final_ledger.cash - 95.69).abs() < 1e-9);
    assert!(result.final_ledger.cash >= 0.0);

    // The sub-share reservation was made and then cancelled.
    let stats = result.final_ledger.reservation_stats;
    assert_eq!((stats.opened, stats.filled, stats.cancelled), (3, 2, 1));
    assert_eq!(result.final_ledger.reserved_cash, 0.0);
}

#[test]
fn buffered_batch_recovers_from_insufficient_funds() {
    let result = batch_scenario(0.016);

    assert!(result.outcomes[0].is_filled());
    assert!(result.outcomes[1].is_filled());
    assert_eq!(
        result.outcomes[2].status,
        OutcomeStatus::NotPlaced {
            reason: SkipReason::InsufficientFunds
        }
    );
    for fill in &result.trade_log {
        assert!(fill.cash_outflow() <= 1297.29);
    }
    assert!(result.final_ledger.cash >= 0.0);
    assert_eq!(result.final_ledger.reservation_stats.outstanding(), 0);
}

// ── 2. Exit policy ───────────────────────────────────────────────────

#[test]
fn stop_loss_fires_inside_holding_period() {
    let strategy = ScriptedStrategy::new().at(day(1), "SPY", SignalKind::Long);
    let bars = vec![
        make_bar("SPY", 1, 100.0),
        make_bar("SPY", 2, 94.0),
        make_bar("SPY", 3, 94.0),
    ];
    let result = run_scripted(frictionless(10_000.0), strategy, 10.0, bars);

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, Some(ExitReason::StopLoss));
    assert_eq!(trade.exit_timestamp, day(2));
    assert_eq!(trade.bars_held, 1);
    assert!((trade.net_pnl + 60.0).abs() < 1e-9);
}

#[test]
fn take_profit_waits_for_holding_period() {
    let strategy = ScriptedStrategy::new().at(day(1), "SPY", SignalKind::Long);
    let bars = (1..=6).map(|d| make_bar("SPY", d, if d == 1 { 100.0 } else { 112.0 })).collect();
    let result = run_scripted(frictionless(10_000.0), strategy, 10.0, bars);

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, Some(ExitReason::TakeProfit));
    // Locked on days 2 and 3 (bars_held 1, 2); free on day 4.
    assert_eq!(trade.exit_timestamp, day(4));
    assert_eq!(trade.bars_held, 3);
    assert!((trade.net_pnl - 120.0).abs() < 1e-9);
}

#[test]
fn catastrophic_stop_outranks_stop_loss() {
    let strategy = ScriptedStrategy::new().at(day(1), "SPY", SignalKind::Long);
    let bars = vec![make_bar("SPY", 1, 100.0), make_bar("SPY", 2, 80.0)];
    let result = run_scripted(frictionless(10_000.0), strategy, 10.0, bars);
    assert_eq!(result.trades[0].exit_reason, Some(ExitReason::CatastrophicStop));
}

#[test]
fn technical_exit_held_back_while_locked() {
    let strategy = ScriptedStrategy::new()
        .at(day(1), "SPY", SignalKind::Long)
        .at(day(2), "SPY", SignalKind::Exit)
        .at(day(4), "SPY", SignalKind::Exit);
    let bars = (1..=5).map(|d| make_bar("SPY", d, 101.0)).collect();
    let result = run_scripted(frictionless(10_000.0), strategy, 10.0, bars);

    assert!(result.outcomes.iter().any(|o| o.status
        == OutcomeStatus::NotPlaced {
            reason: SkipReason::HoldingPeriod
        }));
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, Some(ExitReason::TechnicalReversal));
    assert_eq!(result.trades[0].exit_timestamp, day(4));
}

// ── 3. Shorts ────────────────────────────────────────────────────────

#[test]
fn short_stopped_out_on_rally() {
    let strategy = ScriptedStrategy::new().at(day(1), "QQQ", SignalKind::Short);
    let bars = vec![make_bar("QQQ", 1, 100.0), make_bar("QQQ", 2, 106.0)];
    let result = run_scripted(frictionless(10_000.0), strategy, 10.0, bars);

    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, Some(ExitReason::StopLoss));
    assert!((trade.net_pnl + 60.0).abs() < 1e-9);
    assert!((result.final_ledger.cash - 9_940.0).abs() < 1e-9);
    assert!(result.final_ledger.positions.is_empty());
}

#[test]
fn short_cover_cash_is_kept_from_later_entries() {
    // The short and a full-cash long are decided at the same instant.
    let bars = vec![
        make_bar("AAA", 1, 100.0),
        make_bar("ZZZ", 1, 50.0),
        make_bar("AAA", 2, 120.0),
        make_bar("ZZZ", 2, 50.0),
        make_bar("AAA", 3, 160.0),
        make_bar("ZZZ", 3, 50.0),
    ];
    let strategy = Batch {
        trigger: "ZZZ",
        at: day(1),
        signals: vec![("AAA", SignalKind::Short, 100.0), ("ZZZ", SignalKind::Long, 50.0)],
    };
    let result = SimulationEngine::new(
        frictionless(2_000.0),
        Box::new(strategy),
        Box::new(CashFractionSizer::new(1.0)),
        Box::new(CostFillModel::frictionless()),
    )
    .unwrap()
    .run(bars)
    .unwrap();

    let zzz = result.outcomes.iter().find(|o| o.symbol == "ZZZ").unwrap();
    assert_eq!(
        zzz.status,
        OutcomeStatus::NotPlaced {
            reason: SkipReason::ZeroQuantity
        }
    );

    // The rally trips the stop on the next bar and the cover goes through.
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.symbol, "AAA");
    assert_eq!(trade.exit_timestamp, day(2));
    assert_eq!(trade.exit_reason, Some(ExitReason::CatastrophicStop));
    assert!((trade.net_pnl + 400.0).abs() < 1e-9);
    assert!(!result.outcomes.iter().any(|o| o.status
        == OutcomeStatus::NotPlaced {
            reason: SkipReason::InsufficientFunds
        }));
    assert!(result.final_ledger.positions.is_empty());
    assert!((result.final_ledger.cash - 1_600.0).abs() < 1e-9);
}

#[test]
fn shorting_can_be_disabled() {
    let strategy = ScriptedStrategy::new().at(day(1), "QQQ", SignalKind::Short);
    let config = SimConfig {
        allow_short: false,
        ..frictionless(10_000.0)
    };
    let result = run_scripted(config, strategy, 10.0, vec![make_bar("QQQ", 1, 100.0)]);
    assert!(result.trade_log.is_empty());
    assert_eq!(
        result.outcomes[0].status,
        OutcomeStatus::NotPlaced {
            reason: SkipReason::ShortingDisabled
        }
    );
}

// ── 4. Determinism ───────────────────────────────────────────────────

fn wave_bars(symbol: &str, n: usize, phase: f64) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + ((i as f64 * 0.15) + phase).sin() * 12.0 + i as f64 * 0.02;
            Bar {
                symbol: symbol.into(),
                timestamp: (start + chrono::Duration::days(i as i64))
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: close - 0.2,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 50_000,
            }
        })
        .collect()
}

fn crossover_run(seed: u64) -> RunResult {
    let mut bars = wave_bars("SPY", 300, 0.0);
    bars.extend(wave_bars("QQQ", 300, 1.3));
    let config = SimConfig {
        initial_capital: 50_000.0,
        sizer: SizerConfig::CashFraction { fraction: 0.5 },
        fill: FillModelConfig {
            slippage_bps: 5.0,
            jitter_bps: 10.0,
            seed,
        },
        ..SimConfig::default()
    };
    SimulationEngine::from_config(config, Box::new(MaCrossover::new(5, 20)))
        .unwrap()
        .run(bars)
        .unwrap()
}

#[test]
fn identical_runs_have_identical_fingerprints() {
    let a = crossover_run(7);
    let b = crossover_run(7);
    assert!(!a.trade_log.is_empty(), "fixture should trade");
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.final_ledger.fingerprint(), b.final_ledger.fingerprint());
    assert_eq!(a.trades.len(), b.trades.len());
}

#[test]
fn input_order_does_not_matter() {
    let mut bars = wave_bars("SPY", 120, 0.0);
    bars.extend(wave_bars("QQQ", 120, 1.3));
    let mut reversed = bars.clone();
    reversed.reverse();

    let run = |bars: Vec<Bar>| {
        SimulationEngine::from_config(SimConfig::default(), Box::new(MaCrossover::new(5, 20)))
            .unwrap()
            .run(bars)
            .unwrap()
    };
    assert_eq!(run(bars).fingerprint(), run(reversed).fingerprint());
}

// ── 5. Equity accounting ─────────────────────────────────────────────

#[test]
fn equity_curve_is_one_point_per_timestamp() {
    let result = crossover_run(1);
    assert_eq!(result.equity_curve.len(), 300);
    assert!(result
        .equity_curve
        .windows(2)
        .all(|w| w[0].timestamp < w[1].timestamp));

    let last = result.equity_curve.last().unwrap();
    assert!((last.equity - result.final_ledger.equity).abs() < 1e-9);
    assert!((last.cash - result.final_ledger.cash).abs() < 1e-9);

    let marked: f64 = result
        .final_ledger
        .positions
        .iter()
        .map(|p| p.signed_quantity as f64 * p.mark_price)
        .sum();
    assert!((result.final_ledger.equity - (result.final_ledger.cash + marked)).abs() < 1e-6);
}

#[test]
fn every_order_ends_terminal_and_every_reservation_released() {
    let result = crossover_run(3);
    assert!(result.orders.iter().all(|o| o.status.is_terminal()));
    let stats = result.final_ledger.reservation_stats;
    assert_eq!(stats.opened, stats.filled + stats.cancelled);
    assert_eq!(stats.filled, result.trade_log.len());
}

// ── 6. Execution price ───────────────────────────────────────────────

#[test]
fn stale_reference_price_is_sized_at_the_current_close() {
    // The signal still quotes yesterday's close; the market gapped up 5%.
    let bars = vec![make_bar("SPY", 1, 100.0), make_bar("SPY", 2, 105.0)];
    let strategy = Batch {
        trigger: "SPY",
        at: day(2),
        signals: vec![("SPY", SignalKind::Long, 100.0)],
    };
    let config = SimConfig {
        initial_capital: 10_000.0,
        exits: ExitRules::disabled(),
        ..SimConfig::default()
    };
    let fill_model = CostFillModel::new(&config.fill, config.commission_rate);
    let result = SimulationEngine::new(
        config,
        Box::new(strategy),
        Box::new(CashFractionSizer::new(1.0)),
        Box::new(fill_model),
    )
    .unwrap()
    .run(bars)
    .unwrap();

    // 10_000 / (105 * 1.016) buys 93 shares.
    assert!(result.outcomes[0].is_filled());
    assert_eq!(result.outcomes[0].quantity, 93);
    let notional = 93.0 * 105.0 * 1.0005;
    let expected_cash = 10_000.0 - notional * 1.001;
    assert!((result.final_ledger.cash - expected_cash).abs() < 1e-6);
    assert!(result.final_ledger.cash >= 0.0);
    assert_eq!(result.final_ledger.reservation_stats.outstanding(), 0);
}

/// Fills every order 50% above the close.
#[derive(Debug)]
struct Gapping;

impl FillModel for Gapping {
    fn execute(&self, order: &Order, bar: &Bar) -> Option<Fill> {
        Some(Fill {
            order_id: order.id,
            timestamp: bar.timestamp,
            symbol: order.symbol.clone(),
            quantity: order.signed_quantity(),
            fill_price: bar.close * 1.5,
            commission: 0.0,
        })
    }

    fn name(&self) -> &str {
        "gapping"
    }
}

#[test]
fn fill_beyond_cash_is_rejected_not_fatal() {
    let strategy = ScriptedStrategy::new().at(day(1), "SPY", SignalKind::Long);
    let result = SimulationEngine::new(
        SimConfig {
            exits: ExitRules::disabled(),
            ..frictionless(1_000.0)
        },
        Box::new(strategy),
        Box::new(FixedSizer::shares(8.0)),
        Box::new(Gapping),
    )
    .unwrap()
    .run(vec![make_bar("SPY", 1, 100.0)])
    .unwrap();

    // 8 x 150 = 1200 against 800 reserved plus 200 free.
    assert!(matches!(result.outcomes[0].status, OutcomeStatus::Rejected { .. }));
    assert!(matches!(result.orders[0].status, OrderStatus::Rejected { .. }));
    assert!(result.trade_log.is_empty());
    assert_eq!(result.final_ledger.cash, 1_000.0);
    assert_eq!(result.final_ledger.reserved_cash, 0.0);
    assert!(result.final_ledger.positions.is_empty());
}
