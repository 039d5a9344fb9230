//! Strategies — turn bar history into trading signals.
//!
//! Strategies are portfolio-agnostic: they see only the bar history of the
//! symbol being evaluated, never cash or positions. Whether a signal becomes
//! an order is decided downstream by the engine and the ledger.

pub mod buy_and_hold;
pub mod history;
pub mod ma_crossover;
pub mod scripted;

pub use buy_and_hold::BuyAndHold;
pub use history::BarHistory;
pub use ma_crossover::MaCrossover;
pub use scripted::ScriptedStrategy;

use crate::config::ConfigError;
use crate::domain::{Bar, Signal};
use serde::{Deserialize, Serialize};

/// Signal generation interface.
///
/// # Architecture invariant
/// `history` ends with the bar that was just dispatched. Implementations must
/// only read from it and must return signals stamped with that bar's timestamp.
pub trait Strategy: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Signals for `symbol` after its latest bar, in emission order.
    fn generate_signals(&self, symbol: &str, history: &[Bar]) -> Vec<Signal>;
}

/// Strategy selection for config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    /// Long on fast-over-slow SMA cross, exit on cross-under.
    MaCrossover { fast_period: usize, slow_period: usize },

    /// Long on each symbol's first tradable bar.
    BuyAndHold,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::MaCrossover {
            fast_period: 10,
            slow_period: 50,
        }
    }
}

impl StrategyConfig {
    pub fn build(&self) -> Result<Box<dyn Strategy>, ConfigError> {
        match *self {
            Self::MaCrossover {
                fast_period,
                slow_period,
            } => {
                if fast_period == 0 || slow_period <= fast_period {
                    return Err(ConfigError::Invalid {
                        field: "strategy",
                        reason: format!(
                            "need 1 <= fast_period < slow_period, got {fast_period}/{slow_period}"
                        ),
                    });
                }
                Ok(Box::new(MaCrossover::new(fast_period, slow_period)))
            }
            Self::BuyAndHold => Ok(Box::new(BuyAndHold)),
        }
    }
}
