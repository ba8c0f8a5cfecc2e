use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Signed; negative means short.
    pub quantity: f64,
    #[serde(default)]
    pub avg_price: f64,
    #[serde(default)]
    pub mark_price: Option<f64>,
}

impl Position {
    /// Mark price, falling back to the average entry price.
    pub fn price(&self) -> f64 {
        self.mark_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or(self.avg_price)
    }

    pub fn notional(&self) -> f64 {
        (self.quantity * self.price()).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub cash: f64,
    pub equity: f64,
    #[serde(default)]
    pub peak_equity: Option<f64>,
    #[serde(default)]
    pub day_start_equity: Option<f64>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub trades_today: u32,
    #[serde(default)]
    pub last_trade_at: BTreeMap<String, i64>,
}

impl AccountState {
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions
            .iter()
            .find(|p| p.symbol.eq_ignore_ascii_case(symbol.trim()))
    }

    pub fn position_qty(&self, symbol: &str) -> f64 {
        self.position(symbol).map(|p| p.quantity).unwrap_or(0.0)
    }

    pub fn gross_exposure(&self) -> f64 {
        self.positions.iter().map(Position::notional).sum()
    }

    pub fn drawdown_pct(&self) -> f64 {
        let peak = self.peak_equity.unwrap_or(self.equity).max(self.equity);
        if peak <= 0.0 {
            return 0.0;
        }
        ((peak - self.equity) / peak).max(0.0)
    }

    pub fn daily_loss_pct(&self) -> f64 {
        let Some(start) = self.day_start_equity else {
            return 0.0;
        };
        if start <= 0.0 {
            return 0.0;
        }
        ((start - self.equity) / start).max(0.0)
    }

    pub fn last_trade_for(&self, symbol: &str) -> Option<i64> {
        self.last_trade_at
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(symbol.trim()))
            .map(|(_, ts)| *ts)
    }
}
