use crate::value_objects::trade_action::TradeAction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub symbol: String,
    pub action: TradeAction,
    #[serde(default)]
    pub quantity: f64,
    pub price: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub timestamp: i64,
}
