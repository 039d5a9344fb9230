//! Backtest runner — wires together config, data, engine, and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: loads bars from the configured CSV, then runs. Used by the CLI.
//! - `run_on_bars()`: takes pre-loaded bars. Used by sweeps, which load once.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use barsim_core::domain::Bar;
use barsim_core::{RunResult, SimError, SimulationEngine};

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{load_bars, LoadError};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation failed: {0}")]
    Sim(#[from] SimError),
}

impl From<barsim_core::ConfigError> for RunError {
    fn from(err: barsim_core::ConfigError) -> Self {
        Self::Config(ConfigError::Invalid(err))
    }
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: BacktestConfig,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub metrics: PerformanceMetrics,
    /// Hash of the final ledger; equal across repeated runs of one config.
    pub ledger_fingerprint: String,
    pub run: RunResult,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a single backtest, loading bars from `config.data`.
pub fn run_backtest(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_bars(&config.data.path, &config.data.symbols)?;
    run_on_bars(config, loaded.bars, &loaded.dataset_hash)
}

/// Run a backtest over pre-loaded bars without touching the filesystem.
pub fn run_on_bars(
    config: &BacktestConfig,
    bars: Vec<Bar>,
    dataset_hash: &str,
) -> Result<BacktestResult, RunError> {
    let run_id = config.run_id();
    let strategy = config.strategy.build()?;
    let engine = SimulationEngine::from_config(config.sim.clone(), strategy)?;

    let bar_count = bars.len();
    let run = engine.run(bars)?;
    let metrics = PerformanceMetrics::compute(&run);
    let short_id = &run_id[..12];
    info!(
        run_id = short_id,
        trades = metrics.trade_count,
        total_return = metrics.total_return,
        max_drawdown = metrics.max_drawdown,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        dataset_hash: dataset_hash.to_string(),
        bar_count,
        metrics,
        ledger_fingerprint: run.final_ledger.fingerprint(),
        run,
    })
}
