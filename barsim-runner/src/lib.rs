//! barsim runner — config files, data loading, sweeps, metrics, export.
//!
//! This crate builds on `barsim-core` to provide:
//! - TOML backtest configs with content-addressed run ids
//! - CSV bar loading with dataset hashing
//! - Single-run execution with performance metrics
//! - Parallel exit-rule sweeps
//! - JSON and CSV artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, DataConfig, RunId};
pub use data_loader::{load_bars, load_bars_from_reader, LoadError, LoadedData};
pub use export::{load_artifacts, save_artifacts, save_sweep};
pub use metrics::PerformanceMetrics;
pub use runner::{run_backtest, run_on_bars, BacktestResult, RunError, SCHEMA_VERSION};
pub use sweep::{rank_by_return, run_sweep, ExitGrid, SweepRow};
