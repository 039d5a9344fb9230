//! Parameter sweep over exit rules.
//!
//! Every grid point is an independent run with its own engine and ledger, so
//! points run in parallel with rayon. Results come back in grid order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use barsim_core::domain::Bar;
use barsim_core::ExitRules;

use crate::config::{BacktestConfig, RunId};
use crate::metrics::PerformanceMetrics;
use crate::runner::{run_on_bars, RunError};

/// Exit-rule values to sweep. An empty axis keeps the base config's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitGrid {
    pub stop_loss_pcts: Vec<f64>,
    pub take_profit_pcts: Vec<f64>,
    pub trailing_stop_pcts: Vec<f64>,
    pub min_holding_period_bars: Vec<usize>,
}

impl ExitGrid {
    /// A small grid around the default exit rules.
    pub fn default_grid() -> Self {
        Self {
            stop_loss_pcts: vec![0.03, 0.05, 0.08],
            take_profit_pcts: vec![0.06, 0.10, 0.15],
            trailing_stop_pcts: vec![0.02, 0.03, 0.05],
            min_holding_period_bars: vec![1, 3],
        }
    }

    /// Returns the total number of configurations in this grid.
    pub fn size(&self) -> usize {
        [
            self.stop_loss_pcts.len(),
            self.take_profit_pcts.len(),
            self.trailing_stop_pcts.len(),
            self.min_holding_period_bars.len(),
        ]
        .iter()
        .map(|&n| n.max(1))
        .product()
    }

    /// All exit-rule combinations, in nested axis order.
    ///
    /// Combinations that fail validation are dropped.
    pub fn generate(&self, base: &ExitRules) -> Vec<ExitRules> {
        fn pct_axis(values: &[f64], base: Option<f64>) -> Vec<Option<f64>> {
            if values.is_empty() {
                vec![base]
            } else {
                values.iter().map(|&v| Some(v)).collect()
            }
        }

        let stops = pct_axis(&self.stop_loss_pcts, base.stop_loss_pct);
        let targets = pct_axis(&self.take_profit_pcts, base.take_profit_pct);
        let trails = pct_axis(&self.trailing_stop_pcts, base.trailing_stop_pct);
        let holds = if self.min_holding_period_bars.is_empty() {
            vec![base.min_holding_period_bars]
        } else {
            self.min_holding_period_bars.clone()
        };

        let mut out = Vec::with_capacity(self.size());
        for &stop in &stops {
            for &target in &targets {
                for &trail in &trails {
                    for &hold in &holds {
                        let rules = ExitRules {
                            stop_loss_pct: stop,
                            take_profit_pct: target,
                            trailing_stop_pct: trail,
                            min_holding_period_bars: hold,
                            ..base.clone()
                        };
                        if rules.validate().is_ok() {
                            out.push(rules);
                        }
                    }
                }
            }
        }
        out
    }
}

/// One grid point's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRow {
    pub run_id: RunId,
    pub exits: ExitRules,
    pub metrics: PerformanceMetrics,
    pub ledger_fingerprint: String,
}

/// Run every grid point over the same bars.
///
/// Fails on the first run error; a failing point means a config or engine
/// bug, not a bad parameter choice.
pub fn run_sweep(
    base: &BacktestConfig,
    grid: &ExitGrid,
    bars: &[Bar],
    dataset_hash: &str,
) -> Result<Vec<SweepRow>, RunError> {
    let configs: Vec<BacktestConfig> = grid
        .generate(&base.sim.exits)
        .into_iter()
        .map(|exits| {
            let mut config = base.clone();
            config.sim.exits = exits;
            config
        })
        .collect();
    info!(points = configs.len(), bars = bars.len(), "sweep started");

    let rows = configs
        .par_iter()
        .map(|config| {
            let result = run_on_bars(config, bars.to_vec(), dataset_hash)?;
            Ok(SweepRow {
                run_id: result.run_id,
                exits: config.sim.exits.clone(),
                metrics: result.metrics,
                ledger_fingerprint: result.ledger_fingerprint,
            })
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    info!(points = rows.len(), "sweep finished");
    Ok(rows)
}

/// Grid points ordered by total return, best first. Ties keep grid order.
pub fn rank_by_return(rows: &[SweepRow]) -> Vec<&SweepRow> {
    let mut ranked: Vec<&SweepRow> = rows.iter().collect();
    ranked.sort_by(|a, b| b.metrics.total_return.total_cmp(&a.metrics.total_return));
    ranked
}
