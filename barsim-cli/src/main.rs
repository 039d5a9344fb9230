//! barsim CLI — run and sweep commands.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file and save artifacts
//! - `sweep`: run an exit-rule grid over one config in parallel
//!
//! Logging goes to stderr and is controlled with `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use barsim_runner::{
    load_bars, rank_by_return, run_backtest, run_sweep, save_artifacts, save_sweep,
    BacktestConfig, BacktestResult, ExitGrid,
};

#[derive(Parser)]
#[command(name = "barsim", about = "barsim: deterministic bar-by-bar backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the full result JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Sweep exit rules over one config.
    Sweep {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// TOML file with an exit grid. Defaults to a built-in grid.
        #[arg(long)]
        grid: Option<PathBuf>,

        /// Where to write the sweep table.
        #[arg(long, default_value = "results/sweep.csv")]
        output: PathBuf,

        /// How many of the best grid points to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            output_dir,
            json,
        } => run_cmd(&config, &output_dir, json),
        Commands::Sweep {
            config,
            grid,
            output,
            top,
        } => sweep_cmd(&config, grid.as_deref(), &output, top),
    }
}

fn run_cmd(config_path: &Path, output_dir: &Path, json: bool) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let result = run_backtest(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    let run_dir = save_artifacts(&result, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn sweep_cmd(config_path: &Path, grid_path: Option<&Path>, output: &Path, top: usize) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let grid = match grid_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<ExitGrid>(&text)
                .with_context(|| format!("failed to parse grid {}", path.display()))?
        }
        None => ExitGrid::default_grid(),
    };
    if grid.generate(&config.sim.exits).is_empty() {
        bail!("exit grid has no valid combinations");
    }

    let loaded = load_bars(&config.data.path, &config.data.symbols)?;
    let rows = run_sweep(&config, &grid, &loaded.bars, &loaded.dataset_hash)?;
    save_sweep(&rows, output)?;

    println!("Sweep: {} points over {} bars", rows.len(), loaded.bars.len());
    println!(
        "{:>4}  {:>6} {:>6} {:>6} {:>4}  {:>9} {:>9} {:>6} {:>6}",
        "rank", "stop", "tp", "trail", "hold", "return", "max_dd", "win", "trades"
    );
    for (i, row) in rank_by_return(&rows).into_iter().take(top).enumerate() {
        let pct = |v: Option<f64>| v.map_or("-".to_string(), |x| format!("{:.1}%", x * 100.0));
        println!(
            "{:>4}  {:>6} {:>6} {:>6} {:>4}  {:>8.2}% {:>8.2}% {:>5.1}% {:>6}",
            i + 1,
            pct(row.exits.stop_loss_pct),
            pct(row.exits.take_profit_pct),
            pct(row.exits.trailing_stop_pct),
            row.exits.min_holding_period_bars,
            row.metrics.total_return * 100.0,
            row.metrics.max_drawdown * 100.0,
            row.metrics.win_rate * 100.0,
            row.metrics.trade_count,
        );
    }
    println!("Sweep table saved to: {}", output.display());
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    let ledger = &result.run.final_ledger;
    println!("Run {}", &result.run_id[..12]);
    println!("  Bars:            {}", result.bar_count);
    println!("  Dataset:         {}", &result.dataset_hash[..12]);
    println!("  Initial capital: {:.2}", m.initial_capital);
    println!("  Final equity:    {:.2}", m.final_equity);
    println!("  Cash:            {:.2}", ledger.cash);
    println!("  Total return:    {:.2}%", m.total_return * 100.0);
    println!("  Max drawdown:    {:.2}%", m.max_drawdown * 100.0);
    println!("  Trades:          {}", m.trade_count);
    println!("  Win rate:        {:.1}%", m.win_rate * 100.0);
    println!("  Profit factor:   {:.2}", m.profit_factor);
    println!("  Commission:      {:.2}", m.total_commission);
    println!("  Not placed:      {}", m.not_placed);
    println!("  Open positions:  {}", ledger.positions.len());
    println!("  Ledger hash:     {}", &result.ledger_fingerprint[..12]);
}
