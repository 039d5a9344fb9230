//! Performance metrics — pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! No dependencies on the runner, data pipeline, or engine.

use barsim_core::domain::TradeRecord;
use barsim_core::engine::{EquityPoint, RunResult};
use serde::{Deserialize, Serialize};

/// Aggregate performance metrics for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_trade_return: f64,
    pub avg_bars_held: f64,
    pub trade_count: usize,
    pub fill_count: usize,
    pub total_commission: f64,
    pub realized_pnl: f64,
    /// Signals that never became an order.
    pub not_placed: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from a finished run.
    pub fn compute(result: &RunResult) -> Self {
        let ledger = &result.final_ledger;
        let equity = equity_values(&result.equity_curve);
        Self {
            initial_capital: ledger.initial_capital,
            final_equity: ledger.equity,
            total_return: total_return(ledger.initial_capital, ledger.equity),
            max_drawdown: max_drawdown(&equity),
            win_rate: win_rate(&result.trades),
            profit_factor: profit_factor(&result.trades),
            avg_trade_return: avg_trade_return(&result.trades),
            avg_bars_held: avg_bars_held(&result.trades),
            trade_count: result.trades.len(),
            fill_count: result.trade_log.len(),
            total_commission: ledger.total_commission,
            realized_pnl: ledger.realized_pnl,
            not_placed: result.not_placed().count(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn equity_values(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.equity).collect()
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_equity - initial) / initial
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Win rate: fraction of trades with positive net PnL.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.net_pnl > 0.0)
        .map(|t| t.net_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

pub fn avg_trade_return(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(TradeRecord::return_pct).sum::<f64>() / trades.len() as f64
}

pub fn avg_bars_held(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.bars_held as f64).sum::<f64>() / trades.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use barsim_core::domain::{ExitReason, PositionSide};
    use chrono::NaiveDate;

    fn make_trade(net_pnl: f64, bars_held: usize) -> TradeRecord {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TradeRecord {
            symbol: "SPY".into(),
            side: PositionSide::Long,
            entry_timestamp: ts,
            entry_price: 100.0,
            exit_timestamp: ts,
            exit_price: 100.0 + net_pnl / 50.0,
            quantity: 50,
            gross_pnl: net_pnl,
            commission: 0.0,
            net_pnl,
            bars_held,
            exit_reason: Some(ExitReason::TechnicalReversal),
        }
    }

    #[test]
    fn total_return_basic() {
        assert!((total_return(100.0, 110.0) - 0.10).abs() < 1e-12);
        assert_eq!(total_return(0.0, 10.0), 0.0);
    }

    #[test]
    fn max_drawdown_finds_worst_peak_to_trough() {
        let eq = [100.0, 120.0, 90.0, 130.0, 117.0];
        assert!((max_drawdown(&eq) - (-0.25)).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn win_rate_and_profit_factor() {
        let trades = vec![
            make_trade(100.0, 3),
            make_trade(-50.0, 5),
            make_trade(50.0, 4),
            make_trade(0.0, 2),
        ];
        assert!((win_rate(&trades) - 0.5).abs() < 1e-12);
        assert!((profit_factor(&trades) - 3.0).abs() < 1e-12);
        assert!((avg_bars_held(&trades) - 3.5).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_caps_when_no_losses() {
        assert_eq!(profit_factor(&[make_trade(10.0, 1)]), 100.0);
        assert_eq!(profit_factor(&[make_trade(0.0, 1)]), 0.0);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn avg_trade_return_uses_entry_cost() {
        // 50 shares at 100 → 5000 cost; +250 and -250 average to zero.
        let trades = vec![make_trade(250.0, 1), make_trade(-250.0, 1)];
        assert!(avg_trade_return(&trades).abs() < 1e-12);
        assert!((avg_trade_return(&trades[..1]) - 0.05).abs() < 1e-12);
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn drawdown_is_bounded(eq in prop::collection::vec(1.0f64..1e6, 0..200)) {
                let dd = max_drawdown(&eq);
                prop_assert!(dd <= 0.0);
                prop_assert!(dd > -1.0);
            }

            #[test]
            fn rising_curve_has_no_drawdown(start in 1.0f64..1e4, steps in prop::collection::vec(0.0f64..10.0, 1..100)) {
                let eq: Vec<f64> = steps
                    .iter()
                    .scan(start, |acc, s| {
                        *acc += s;
                        Some(*acc)
                    })
                    .collect();
                prop_assert_eq!(max_drawdown(&eq), 0.0);
            }
        }
    }
}
