use arena_domain::entities::metrics::MetricsConfig;
use arena_domain::repositories::series::{SeriesData, SeriesReader};
use arena_domain::services::evaluation::equity_from_returns;
use arena_domain::services::returns::{clean_returns, log_returns, simple_returns};
use arena_domain::value_objects::equity_point::EquityPoint;
use arena_domain::value_objects::fill::Fill;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// An equity curve given as bare values or as timestamped points.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EquityInput {
    Points(Vec<EquityPoint>),
    Values(Vec<f64>),
}

impl EquityInput {
    pub fn into_points(self) -> Vec<EquityPoint> {
        match self {
            Self::Points(points) => points,
            Self::Values(values) => EquityPoint::from_values(&values),
        }
    }
}

/// Every way a payload can describe a single series. `null` entries in
/// `returns` are kept as NaN so callers can count them as dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeriesArgs {
    pub returns: Option<Vec<Option<f64>>>,
    pub prices: Option<Vec<f64>>,
    pub equity: Option<EquityInput>,
    pub returns_csv: Option<String>,
    pub equity_csv: Option<String>,
    pub series_csv: Option<String>,
    pub log_returns: bool,
}

const SERIES_KEYS: &str = "returns, prices, equity, returns_csv, equity_csv or series_csv";

impl SeriesArgs {
    pub fn has_returns(&self) -> bool {
        self.returns.is_some() || self.returns_csv.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FillArgs {
    pub fills: Option<Vec<Fill>>,
    pub trades_csv: Option<String>,
}

/// Per-invocation overrides of the `[metrics]` table.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct MetricOverrides {
    pub risk_free_rate: Option<f64>,
    pub periods_per_year: Option<f64>,
    pub var_confidence: Option<f64>,
}

impl MetricOverrides {
    pub fn apply(&self, base: MetricsConfig) -> Result<MetricsConfig, String> {
        let cfg = MetricsConfig {
            risk_free_rate: self.risk_free_rate.unwrap_or(base.risk_free_rate),
            periods_per_year: self.periods_per_year.unwrap_or(base.periods_per_year),
            var_confidence: self.var_confidence.unwrap_or(base.var_confidence),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

pub fn parse_args<T: DeserializeOwned>(command: &str, payload: &Value) -> Result<T, String> {
    serde_json::from_value(payload.clone())
        .map_err(|err| format!("invalid {command} arguments: {err}"))
}

pub fn to_data<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|err| format!("failed to serialize result: {err}"))
}

/// Overlays the keys of `overrides` on the serialized `base` and reads the result back.
pub fn merge_overrides<T: Clone + Serialize + DeserializeOwned>(
    base: &T,
    overrides: Option<&Value>,
    what: &str,
) -> Result<T, String> {
    let Some(overrides) = overrides else {
        return Ok(base.clone());
    };
    let Value::Object(patch) = overrides else {
        return Err(format!("{what} overrides must be an object"));
    };
    let mut merged = to_data(base)?;
    if let Value::Object(map) = &mut merged {
        for (key, value) in patch {
            map.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(merged).map_err(|err| format!("invalid {what}: {err}"))
}

fn option_values(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

fn returns_of(values: &[f64], log: bool) -> Vec<f64> {
    if log {
        log_returns(values)
    } else {
        simple_returns(values)
    }
}

fn equity_values(points: &[EquityPoint]) -> Vec<f64> {
    points.iter().map(|p| p.equity).collect()
}

/// Raw returns as described by the payload; may contain NaN.
pub fn resolve_returns(args: &SeriesArgs, series: &dyn SeriesReader) -> Result<Vec<f64>, String> {
    if let Some(returns) = &args.returns {
        return Ok(option_values(returns));
    }
    if let Some(prices) = &args.prices {
        return Ok(returns_of(prices, args.log_returns));
    }
    if let Some(equity) = &args.equity {
        let points = equity.clone().into_points();
        return Ok(returns_of(&equity_values(&points), args.log_returns));
    }
    if let Some(path) = &args.returns_csv {
        return series.read_returns_csv(Path::new(path));
    }
    if let Some(path) = &args.equity_csv {
        let points = series.read_equity_csv(Path::new(path))?;
        return Ok(returns_of(&equity_values(&points), args.log_returns));
    }
    if let Some(path) = &args.series_csv {
        return match series.read_series_csv(Path::new(path))? {
            SeriesData::Returns(returns) => Ok(returns),
            SeriesData::Equity(points) => Ok(returns_of(&equity_values(&points), args.log_returns)),
        };
    }
    Err(format!("expected one of {SERIES_KEYS}"))
}

/// Equity curve as described by the payload. Returns are compounded from `base`.
pub fn resolve_equity(
    args: &SeriesArgs,
    series: &dyn SeriesReader,
    base: f64,
) -> Result<Vec<EquityPoint>, String> {
    if let Some(returns) = &args.returns {
        let (clean, _) = clean_returns(&option_values(returns));
        return Ok(equity_from_returns(base, &clean));
    }
    if let Some(prices) = &args.prices {
        return Ok(EquityPoint::from_values(prices));
    }
    if let Some(equity) = &args.equity {
        return Ok(equity.clone().into_points());
    }
    if let Some(path) = &args.returns_csv {
        let (clean, _) = clean_returns(&series.read_returns_csv(Path::new(path))?);
        return Ok(equity_from_returns(base, &clean));
    }
    if let Some(path) = &args.equity_csv {
        return series.read_equity_csv(Path::new(path));
    }
    if let Some(path) = &args.series_csv {
        return match series.read_series_csv(Path::new(path))? {
            SeriesData::Equity(points) => Ok(points),
            SeriesData::Returns(returns) => {
                let (clean, _) = clean_returns(&returns);
                Ok(equity_from_returns(base, &clean))
            }
        };
    }
    Err(format!("expected one of {SERIES_KEYS}"))
}

pub fn resolve_fills(args: &FillArgs, series: &dyn SeriesReader) -> Result<Vec<Fill>, String> {
    if let Some(fills) = &args.fills {
        return Ok(fills.clone());
    }
    if let Some(path) = &args.trades_csv {
        return series.read_fills_csv(Path::new(path));
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_domain::entities::risk::GuardrailLimits;
    use serde_json::json;
    use std::path::Path;

    struct NoFiles;

    impl SeriesReader for NoFiles {
        fn read_returns_csv(&self, path: &Path) -> Result<Vec<f64>, String> {
            Err(format!("unexpected read {}", path.display()))
        }
        fn read_equity_csv(&self, path: &Path) -> Result<Vec<EquityPoint>, String> {
            Err(format!("unexpected read {}", path.display()))
        }
        fn read_fills_csv(&self, path: &Path) -> Result<Vec<Fill>, String> {
            Err(format!("unexpected read {}", path.display()))
        }
        fn read_series_csv(&self, path: &Path) -> Result<SeriesData, String> {
            Err(format!("unexpected read {}", path.display()))
        }
    }

    #[test]
    fn null_returns_become_nan() {
        let args: SeriesArgs =
            parse_args("t", &json!({"returns": [0.01, null, -0.02]})).expect("args");
        let raw = resolve_returns(&args, &NoFiles).expect("returns");
        assert_eq!(raw.len(), 3);
        assert!(raw[1].is_nan());
    }

    #[test]
    fn returns_and_equity_resolve_the_same_key_first() {
        let payload = json!({"returns": [0.1, -0.5], "equity": [7.0, 8.0, 9.0]});
        let args: SeriesArgs = parse_args("t", &payload).expect("args");
        let returns = resolve_returns(&args, &NoFiles).expect("returns");
        assert_eq!(returns, vec![0.1, -0.5]);
        let points = resolve_equity(&args, &NoFiles, 100.0).expect("equity");
        assert_eq!(points.len(), 3);
        assert!((points[2].equity - 55.0).abs() < 1e-9);
    }

    #[test]
    fn equity_accepts_values_or_points() {
        let args: SeriesArgs = parse_args("t", &json!({"equity": [100.0, 110.0]})).expect("values");
        let points = resolve_equity(&args, &NoFiles, 1.0).expect("equity");
        assert_eq!(points[1].equity, 110.0);

        let args: SeriesArgs = parse_args(
            "t",
            &json!({"equity": [{"timestamp": 10, "equity": 5.0}, {"timestamp": 20, "equity": 6.0}]}),
        )
        .expect("points");
        let points = resolve_equity(&args, &NoFiles, 1.0).expect("equity");
        assert_eq!(points[1].timestamp, 20);
    }

    #[test]
    fn returns_compound_from_base() {
        let args: SeriesArgs = parse_args("t", &json!({"returns": [0.1, 0.1]})).expect("args");
        let points = resolve_equity(&args, &NoFiles, 100.0).expect("equity");
        assert_eq!(points.len(), 3);
        assert!((points[2].equity - 121.0).abs() < 1e-9);
    }

    #[test]
    fn missing_series_is_an_error() {
        let err = resolve_returns(&SeriesArgs::default(), &NoFiles).expect_err("empty");
        assert!(err.contains("expected one of"));
    }

    #[test]
    fn merge_overrides_patches_known_fields_and_rejects_unknown() {
        let base = GuardrailLimits::default();
        let merged =
            merge_overrides(&base, Some(&json!({"max_position_pct": 0.5})), "limits").expect("merge");
        assert_eq!(merged.max_position_pct, 0.5);
        assert_eq!(merged.min_trade_value, base.min_trade_value);

        let err = merge_overrides(&base, Some(&json!({"leverage": 2})), "limits")
            .expect_err("unknown key");
        assert!(err.contains("invalid limits"));
    }

    #[test]
    fn metric_overrides_are_validated() {
        let overrides = MetricOverrides {
            var_confidence: Some(1.0),
            ..MetricOverrides::default()
        };
        assert!(overrides.apply(MetricsConfig::default()).is_err());
    }
}
