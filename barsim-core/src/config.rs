//! Simulation configuration — capital, costs, reservation buffer, exit rules.
//!
//! Every field has a default so partial TOML/JSON documents deserialize.

use crate::fill_model::FillModelConfig;
use crate::sizers::SizerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Exit thresholds. `None` disables a trigger.
///
/// All percentages are fractions of the average entry price (0.05 = 5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitRules {
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    /// Retracement from the best price that fires an armed trailing stop.
    pub trailing_stop_pct: Option<f64>,
    /// Best return required before the trailing stop arms.
    pub trailing_activation_pct: f64,
    pub catastrophic_stop_pct: Option<f64>,
    /// Bars before take-profit and technical exits are honored.
    pub min_holding_period_bars: usize,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            stop_loss_pct: Some(0.05),
            take_profit_pct: Some(0.10),
            trailing_stop_pct: Some(0.03),
            trailing_activation_pct: 0.05,
            catastrophic_stop_pct: Some(0.15),
            min_holding_period_bars: 3,
        }
    }
}

impl ExitRules {
    /// No automatic exits; only strategy exits close positions.
    pub fn disabled() -> Self {
        Self {
            stop_loss_pct: None,
            take_profit_pct: None,
            trailing_stop_pct: None,
            trailing_activation_pct: 0.0,
            catastrophic_stop_pct: None,
            min_holding_period_bars: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("trailing_stop_pct", self.trailing_stop_pct),
            ("catastrophic_stop_pct", self.catastrophic_stop_pct),
        ];
        for (field, value) in fractions {
            if let Some(v) = value {
                if !(v > 0.0 && v < 1.0) {
                    return Err(ConfigError::invalid(field, format!("must be in (0, 1), got {v}")));
                }
            }
        }
        if !(self.trailing_activation_pct >= 0.0 && self.trailing_activation_pct.is_finite()) {
            return Err(ConfigError::invalid(
                "trailing_activation_pct",
                format!("must be >= 0, got {}", self.trailing_activation_pct),
            ));
        }
        if let (Some(stop), Some(cat)) = (self.stop_loss_pct, self.catastrophic_stop_pct) {
            if cat < stop {
                return Err(ConfigError::invalid(
                    "catastrophic_stop_pct",
                    format!("must be >= stop_loss_pct ({stop}), got {cat}"),
                ));
            }
        }
        Ok(())
    }
}

/// Everything a single simulation run needs besides data and a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub initial_capital: f64,
    /// Commission as a fraction of notional.
    pub commission_rate: f64,
    /// Headroom added to each opening reservation for slippage and commission.
    pub reservation_buffer_pct: f64,
    /// Quantities are rounded down to a multiple of this.
    pub lot_size: u64,
    /// Abort the run after this many dispatched events.
    pub max_events: usize,
    pub allow_pyramiding: bool,
    pub allow_short: bool,
    pub exits: ExitRules,
    pub sizer: SizerConfig,
    pub fill: FillModelConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            commission_rate: 0.001,
            reservation_buffer_pct: 0.016,
            lot_size: 1,
            max_events: 1_000_000,
            allow_pyramiding: false,
            allow_short: true,
            exits: ExitRules::default(),
            sizer: SizerConfig::default(),
            fill: FillModelConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::invalid(
                "initial_capital",
                format!("must be > 0, got {}", self.initial_capital),
            ));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return Err(ConfigError::invalid(
                "commission_rate",
                format!("must be in [0, 1), got {}", self.commission_rate),
            ));
        }
        // A buy filled at the worst slippage pays commission on the slipped notional.
        let worst_cost = (1.0 + self.commission_rate) * (1.0 + self.fill.worst_case_slippage()) - 1.0;
        if !(self.reservation_buffer_pct.is_finite() && self.reservation_buffer_pct >= 0.0) {
            return Err(ConfigError::invalid(
                "reservation_buffer_pct",
                format!("must be >= 0, got {}", self.reservation_buffer_pct),
            ));
        }
        if self.reservation_buffer_pct + 1e-12 < worst_cost {
            return Err(ConfigError::invalid(
                "reservation_buffer_pct",
                format!(
                    "{} does not cover commission plus worst-case slippage ({worst_cost})",
                    self.reservation_buffer_pct
                ),
            ));
        }
        if self.lot_size == 0 {
            return Err(ConfigError::invalid("lot_size", "must be >= 1"));
        }
        if self.max_events == 0 {
            return Err(ConfigError::invalid("max_events", "must be >= 1"));
        }
        if let Some(problem) = self.sizer.problem() {
            return Err(ConfigError::invalid("sizer", problem));
        }
        self.fill.validate()?;
        self.exits.validate()
    }
}
