//! Simulation engine — event loop, outcomes, and run results.
//!
//! Per market event:
//!
//! 1. Mark the symbol's open position to the bar close
//! 2. Ask the strategy for signals; strategy exits become technical reversals
//! 3. Run the exit policy on the position, possibly emitting a synthetic exit
//! 4. Resolve each signal fully (size → reserve → order → fill) before the next

pub mod result;
pub mod simulation;

pub use result::{EquityPoint, OrderOutcome, OutcomeStatus, RunResult, SimError, SkipReason};
pub use simulation::{round_to_lot, SimulationEngine};
