use crate::domain::ids::OrderId;
use crate::domain::Timestamp;
use serde::{Deserialize, Serialize};

/// Fill record produced by a fill model.
///
/// `quantity` is signed: positive for buys, negative for sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub timestamp: Timestamp,
    pub symbol: String,
    pub quantity: i64,
    pub fill_price: f64,
    pub commission: f64,
}

impl Fill {
    /// Cash consumed by this fill (negative for net inflows).
    pub fn cash_outflow(&self) -> f64 {
        self.quantity as f64 * self.fill_price + self.commission
    }

    pub fn is_buy(&self) -> bool {
        self.quantity > 0
    }
}
