//! TOML backtest configuration.
//!
//! A config file names a bar CSV, the symbols to keep, a strategy, and the
//! simulation settings:
//!
//! ```toml
//! [data]
//! path = "bars.csv"
//! symbols = ["SPY", "QQQ"]
//!
//! [strategy]
//! type = "MA_CROSSOVER"
//! fast_period = 10
//! slow_period = 50
//!
//! [sim]
//! initial_capital = 100000.0
//! commission_rate = 0.001
//!
//! [sim.exits]
//! stop_loss_pct = 0.05
//!
//! [sim.sizer]
//! type = "CASH_FRACTION"
//! fraction = 0.25
//! ```
//!
//! Every section except `[data]` may be omitted and falls back to defaults.

use std::path::{Path, PathBuf};

use barsim_core::strategy::StrategyConfig;
use barsim_core::SimConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Errors from loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] barsim_core::ConfigError),
    #[error("data section: {0}")]
    Data(String),
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV file with `symbol,timestamp,open,high,low,close,volume` columns.
    pub path: PathBuf,
    /// Symbols to keep. Empty keeps every symbol in the file.
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Everything needed to reproduce one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

impl BacktestConfig {
    /// Load and validate a TOML config file.
    ///
    /// A relative `data.path` is resolved against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if config.data.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.data.path = dir.join(&config.data.path);
            }
        }
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sim.validate()?;
        self.strategy.build()?;
        if self.data.path.as_os_str().is_empty() {
            return Err(ConfigError::Data("path must not be empty".into()));
        }
        if let Some(blank) = self.data.symbols.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Data(format!("blank symbol {blank:?}")));
        }
        Ok(())
    }

    /// Deterministic hash of the strategy and simulation settings.
    ///
    /// The data path is left out so the same run over a moved file keeps its
    /// id; the dataset itself is identified by its own hash.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(&(&self.strategy, &self.sim, &self.data.symbols))
            .expect("BacktestConfig serialization failed");
        let hash = blake3::hash(json.as_bytes());
        format!("{}", hash.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barsim_core::sizers::SizerConfig;

    const MINIMAL: &str = r#"
[data]
path = "bars.csv"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = BacktestConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.sim, SimConfig::default());
        assert_eq!(config.strategy, StrategyConfig::default());
        assert!(config.data.symbols.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let text = r#"
[data]
path = "bars.csv"
symbols = ["SPY", "QQQ"]

[strategy]
type = "BUY_AND_HOLD"

[sim]
initial_capital = 50000.0
allow_short = false

[sim.exits]
stop_loss_pct = 0.04
min_holding_period_bars = 5

[sim.sizer]
type = "CASH_FRACTION"
fraction = 0.25
"#;
        let config = BacktestConfig::from_toml_str(text).unwrap();
        assert_eq!(config.strategy, StrategyConfig::BuyAndHold);
        assert_eq!(config.sim.initial_capital, 50_000.0);
        assert!(!config.sim.allow_short);
        assert_eq!(config.sim.exits.stop_loss_pct, Some(0.04));
        assert_eq!(config.sim.exits.min_holding_period_bars, 5);
        // Unset exit fields keep their defaults.
        assert_eq!(config.sim.exits.take_profit_pct, Some(0.10));
        assert_eq!(config.sim.sizer, SizerConfig::CashFraction { fraction: 0.25 });
    }

    #[test]
    fn invalid_sim_settings_rejected() {
        let text = r#"
[data]
path = "bars.csv"

[sim]
reservation_buffer_pct = 0.0
"#;
        let err = BacktestConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {err}");
    }

    #[test]
    fn invalid_strategy_rejected() {
        let text = r#"
[data]
path = "bars.csv"

[strategy]
type = "MA_CROSSOVER"
fast_period = 50
slow_period = 10
"#;
        assert!(matches!(
            BacktestConfig::from_toml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_data_section_is_a_parse_error() {
        assert!(matches!(
            BacktestConfig::from_toml_str("[sim]\ninitial_capital = 1.0\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn run_id_deterministic() {
        let config = BacktestConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.run_id(), config.run_id());
        assert_eq!(config.run_id().len(), 64);
    }

    #[test]
    fn run_id_changes_with_params() {
        let a = BacktestConfig::from_toml_str(MINIMAL).unwrap();
        let mut b = a.clone();
        b.sim.exits.stop_loss_pct = Some(0.07);
        assert_ne!(a.run_id(), b.run_id());

        let mut moved = a.clone();
        moved.data.path = PathBuf::from("/elsewhere/bars.csv");
        assert_eq!(a.run_id(), moved.run_id());
    }

    #[test]
    fn relative_data_path_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = BacktestConfig::from_file(&path).unwrap();
        assert_eq!(config.data.path, dir.path().join("bars.csv"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = BacktestConfig::from_file(Path::new("/no/such/run.toml")).unwrap_err();
        assert!(err.to_string().contains("/no/such/run.toml"));
    }
}
