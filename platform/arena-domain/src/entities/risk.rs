use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardrailLimits {
    pub max_position_pct: f64,
    pub max_total_exposure_pct: f64,
    pub min_trade_value: f64,
    pub max_daily_loss_pct: f64,
    pub max_drawdown_pct: f64,
    pub max_trades_per_day: u32,
    pub min_confidence: f64,
    pub cooldown_seconds: i64,
    pub allow_short: bool,
    pub allowed_symbols: Vec<String>,
}

impl Default for GuardrailLimits {
    fn default() -> Self {
        Self {
            max_position_pct: 0.25,
            max_total_exposure_pct: 1.0,
            min_trade_value: 10.0,
            max_daily_loss_pct: 0.05,
            max_drawdown_pct: 0.20,
            max_trades_per_day: 50,
            min_confidence: 0.0,
            cooldown_seconds: 0,
            allow_short: false,
            allowed_symbols: Vec::new(),
        }
    }
}

impl GuardrailLimits {
    pub fn validate(&self) -> Result<(), String> {
        let fractions = [
            ("max_position_pct", self.max_position_pct),
            ("max_total_exposure_pct", self.max_total_exposure_pct),
            ("max_daily_loss_pct", self.max_daily_loss_pct),
            ("max_drawdown_pct", self.max_drawdown_pct),
        ];
        for (name, value) in fractions {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("guardrails.{name} must be finite and > 0"));
            }
        }
        if !self.min_trade_value.is_finite() || self.min_trade_value < 0.0 {
            return Err("guardrails.min_trade_value must be finite and >= 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err("guardrails.min_confidence must be in [0, 1]".to_string());
        }
        if self.cooldown_seconds < 0 {
            return Err("guardrails.cooldown_seconds must be >= 0".to_string());
        }
        Ok(())
    }

    pub fn allows_symbol(&self, symbol: &str) -> bool {
        self.allowed_symbols.is_empty()
            || self
                .allowed_symbols
                .iter()
                .any(|s| s.eq_ignore_ascii_case(symbol.trim()))
    }

    pub fn allows_drawdown(&self, drawdown_pct: f64) -> bool {
        drawdown_pct < self.max_drawdown_pct
    }

    pub fn allows_daily_loss(&self, loss_pct: f64) -> bool {
        loss_pct < self.max_daily_loss_pct
    }

    pub fn allows_trade_count(&self, trades_today: u32) -> bool {
        trades_today < self.max_trades_per_day
    }
}
