use crate::value_objects::side::Side;
use serde::{Deserialize, Serialize};

/// An executed trade as reported by an agent or backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: i64,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    #[serde(default)]
    pub fee: f64,
}

impl Fill {
    pub fn is_valid(&self) -> bool {
        self.quantity.is_finite()
            && self.quantity > 0.0
            && self.price.is_finite()
            && self.price > 0.0
            && self.fee.is_finite()
            && self.fee >= 0.0
    }
}
