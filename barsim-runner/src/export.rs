//! Reporting and export — JSON and CSV artifact generation.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape, fill log, equity curve, signal outcomes, sweep table
//!
//! All persisted results include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use barsim_core::domain::{Fill, TradeRecord};
use barsim_core::engine::{EquityPoint, OrderOutcome, OutcomeStatus};

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepRow;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export round-trip trades.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "side",
        "entry_timestamp",
        "entry_price",
        "exit_timestamp",
        "exit_price",
        "quantity",
        "gross_pnl",
        "commission",
        "net_pnl",
        "return_pct",
        "bars_held",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.symbol,
            &format!("{:?}", t.side),
            &t.entry_timestamp.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_timestamp.to_string(),
            &format!("{:.6}", t.exit_price),
            &t.quantity.to_string(),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.net_pnl),
            &format!("{:.6}", t.return_pct()),
            &t.bars_held.to_string(),
            &t.exit_reason.map(|r| r.to_string()).unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

/// Export every fill in execution order.
pub fn export_fills_csv(fills: &[Fill]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "order_id",
        "timestamp",
        "symbol",
        "quantity",
        "fill_price",
        "commission",
        "cash_outflow",
    ])?;
    for f in fills {
        wtr.write_record([
            &f.order_id.0.to_string(),
            &f.timestamp.to_string(),
            &f.symbol,
            &f.quantity.to_string(),
            &format!("{:.6}", f.fill_price),
            &format!("{:.6}", f.commission),
            &format!("{:.6}", f.cash_outflow()),
        ])?;
    }
    finish(wtr)
}

/// Export the equity curve, one row per timestamp.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "cash"])?;
    for p in equity_curve {
        wtr.write_record([
            &p.timestamp.to_string(),
            &format!("{:.2}", p.equity),
            &format!("{:.2}", p.cash),
        ])?;
    }
    finish(wtr)
}

/// Export what became of every signal.
pub fn export_outcomes_csv(outcomes: &[OrderOutcome]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp", "symbol", "signal", "origin", "order_id", "quantity", "status", "detail",
    ])?;
    for o in outcomes {
        let (status, detail) = match &o.status {
            OutcomeStatus::Filled { fill_price } => ("filled", format!("{fill_price:.6}")),
            OutcomeStatus::NotPlaced { reason } => ("not_placed", format!("{reason:?}")),
            OutcomeStatus::Cancelled { reason } => ("cancelled", reason.clone()),
            OutcomeStatus::Rejected { reason } => ("rejected", reason.clone()),
        };
        wtr.write_record([
            &o.timestamp.to_string(),
            &o.symbol,
            &format!("{:?}", o.signal),
            &format!("{:?}", o.origin),
            &o.order_id.map(|id| id.0.to_string()).unwrap_or_default(),
            &o.quantity.to_string(),
            &status.to_string(),
            &detail,
        ])?;
    }
    finish(wtr)
}

/// Export a sweep as one row per grid point.
pub fn export_sweep_csv(rows: &[SweepRow]) -> Result<String> {
    fn opt(v: Option<f64>) -> String {
        v.map(|x| format!("{x:.4}")).unwrap_or_default()
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "run_id",
        "stop_loss_pct",
        "take_profit_pct",
        "trailing_stop_pct",
        "min_holding_period_bars",
        "total_return",
        "max_drawdown",
        "win_rate",
        "profit_factor",
        "trade_count",
        "total_commission",
    ])?;
    for r in rows {
        wtr.write_record([
            &r.run_id,
            &opt(r.exits.stop_loss_pct),
            &opt(r.exits.take_profit_pct),
            &opt(r.exits.trailing_stop_pct),
            &r.exits.min_holding_period_bars.to_string(),
            &format!("{:.6}", r.metrics.total_return),
            &format!("{:.6}", r.metrics.max_drawdown),
            &format!("{:.4}", r.metrics.win_rate),
            &format!("{:.4}", r.metrics.profit_factor),
            &r.metrics.trade_count.to_string(),
            &format!("{:.2}", r.metrics.total_commission),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single run.
///
/// Creates `{run_id[..12]}/` under `output_dir` containing:
/// - `result.json`: the full `BacktestResult`
/// - `trades.csv`: round-trip trades
/// - `fills.csv`: every fill
/// - `equity.csv`: equity curve
/// - `outcomes.csv`: signal outcomes
///
/// The directory name derives from the run id, so re-running a config
/// overwrites its previous artifacts. Returns the directory path.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id = result.run_id.get(..12).unwrap_or(&result.run_id);
    let run_dir = output_dir.join(short_id);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("result.json", export_json(result)?),
        ("trades.csv", export_trades_csv(&result.run.trades)?),
        ("fills.csv", export_fills_csv(&result.run.trade_log)?),
        ("equity.csv", export_equity_csv(&result.run.equity_curve)?),
        ("outcomes.csv", export_outcomes_csv(&result.run.outcomes)?),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's result.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

/// Write a sweep table to `path`, creating parent directories.
pub fn save_sweep(rows: &[SweepRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, export_sweep_csv(rows)?)
        .with_context(|| format!("failed to write {}", path.display()))
}
