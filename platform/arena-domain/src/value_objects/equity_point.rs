use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub equity: f64,
}

impl EquityPoint {
    /// Builds a curve from bare values, using the index as timestamp.
    pub fn from_values(values: &[f64]) -> Vec<Self> {
        values
            .iter()
            .enumerate()
            .map(|(idx, equity)| Self {
                timestamp: idx as i64,
                equity: *equity,
            })
            .collect()
    }
}
