use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::fill::Fill;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesData {
    Returns(Vec<f64>),
    Equity(Vec<EquityPoint>),
}

pub trait SeriesReader {
    fn read_returns_csv(&self, path: &Path) -> Result<Vec<f64>, String>;
    fn read_equity_csv(&self, path: &Path) -> Result<Vec<EquityPoint>, String>;
    fn read_fills_csv(&self, path: &Path) -> Result<Vec<Fill>, String>;
    /// Equity when the file has an `equity` column, returns otherwise.
    fn read_series_csv(&self, path: &Path) -> Result<SeriesData, String>;
}
