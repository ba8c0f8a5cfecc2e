use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    #[serde(alias = "BUY", alias = "Buy", alias = "long")]
    Buy,
    #[serde(alias = "SELL", alias = "Sell", alias = "short")]
    Sell,
    #[serde(alias = "HOLD", alias = "Hold")]
    Hold,
    #[serde(alias = "CLOSE", alias = "Close")]
    Close,
}

impl TradeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
            Self::Close => "close",
        }
    }
}
