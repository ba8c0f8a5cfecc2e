use serde::{Deserialize, Serialize};

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Annual risk-free rate; de-annualized per period before use.
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    pub var_confidence: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            var_confidence: DEFAULT_VAR_CONFIDENCE,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.risk_free_rate.is_finite() {
            return Err("risk_free_rate must be finite".to_string());
        }
        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err("periods_per_year must be finite and > 0".to_string());
        }
        if !(self.var_confidence > 0.0 && self.var_confidence < 1.0) {
            return Err("var_confidence must be in (0, 1)".to_string());
        }
        Ok(())
    }

    pub fn risk_free_per_period(&self) -> f64 {
        self.risk_free_rate / self.periods_per_year
    }
}
