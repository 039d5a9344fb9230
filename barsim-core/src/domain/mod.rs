//! Domain types for barsim

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use fill::Fill;
pub use ids::{IdGen, OrderId, ReservationId};
pub use order::{Order, OrderError, OrderKind, OrderSide, OrderStatus, PositionEffect};
pub use position::{Position, PositionSide};
pub use signal::{ExitReason, Signal, SignalKind, SignalOrigin};
pub use trade::TradeRecord;

/// Simulated time. Never read from the wall clock.
pub type Timestamp = chrono::NaiveDateTime;

/// Symbol type alias
pub type Symbol = String;
