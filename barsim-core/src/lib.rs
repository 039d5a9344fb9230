//! barsim core — deterministic event-driven bar simulator.
//!
//! This crate contains the simulation core:
//! - Domain types (bars, signals, orders, fills, positions, trades)
//! - Chronological event queue and clock
//! - Portfolio ledger with cash reservations
//! - Position sizers behind a pure sizing trait
//! - Per-position exit policy state machine
//! - Fill model, strategies, and the simulation engine that ties them together

pub mod config;
pub mod domain;
pub mod engine;
pub mod events;
pub mod exit_policy;
pub mod fill_model;
pub mod ledger;
pub mod sizers;
pub mod strategy;

pub use config::{ConfigError, ExitRules, SimConfig};
pub use engine::{RunResult, SimError, SimulationEngine};
pub use ledger::{LedgerError, LedgerSnapshot, PortfolioLedger};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a parallel sweep moves across threads is
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();

        // Core state
        require_send::<events::EventQueue>();
        require_sync::<events::EventQueue>();
        require_send::<PortfolioLedger>();
        require_sync::<PortfolioLedger>();
        require_send::<exit_policy::ExitPolicyEngine>();
        require_sync::<exit_policy::ExitPolicyEngine>();

        // Configuration and results
        require_send::<SimConfig>();
        require_sync::<SimConfig>();
        require_send::<RunResult>();
        require_sync::<RunResult>();
        require_send::<SimulationEngine>();
        require_sync::<SimulationEngine>();
    }

    /// Architecture contract: sizers see a cash figure, never the ledger.
    ///
    /// `size()` takes the signal, available cash, and a price. If a ledger
    /// parameter is ever added, this stops compiling.
    #[test]
    fn sizer_trait_has_no_ledger_parameter() {
        fn _check_trait_object_builds(
            sizer: &dyn sizers::PositionSizer,
            signal: &domain::Signal,
        ) -> f64 {
            sizer.size(signal, 1_000.0, 100.0)
        }
    }

    /// Architecture contract: strategies see bar history, never the portfolio.
    #[test]
    fn strategy_trait_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            strategy: &dyn strategy::Strategy,
            bars: &[domain::Bar],
        ) -> Vec<domain::Signal> {
            strategy.generate_signals("SPY", bars)
        }
    }
}
