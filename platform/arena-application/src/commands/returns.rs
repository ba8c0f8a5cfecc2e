use super::inputs::{parse_args, resolve_returns, to_data, MetricOverrides, SeriesArgs};
use super::CommandContext;
use arena_domain::services::returns::{self as stats, clean_returns, BenchmarkStats, ReturnsStats};
use arena_domain::services::var::{estimate, VarMethod};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeriesPayload {
    #[serde(flatten)]
    series: SeriesArgs,
    #[serde(flatten)]
    overrides: MetricOverrides,
}

pub(super) fn returns_stats(ctx: &CommandContext<'_>, payload: &Value) -> Result<Value, String> {
    let args: SeriesPayload = parse_args("returns-stats", payload)?;
    let cfg = args.overrides.apply(ctx.config.metrics_config()?)?;
    let raw = resolve_returns(&args.series, ctx.series)?;
    let (clean, dropped) = clean_returns(&raw);
    if dropped > 0 {
        tracing::debug!(dropped, "dropped non-finite returns");
    }

    let summary = ReturnsStats::compute(&clean, &cfg)?;
    let mut data = to_data(&summary)?;
    if let Value::Object(map) = &mut data {
        map.insert("dropped".to_string(), json!(dropped));
    }
    Ok(data)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RollingPayload {
    #[serde(flatten)]
    series: SeriesArgs,
    #[serde(flatten)]
    overrides: MetricOverrides,
    window: Option<usize>,
}

pub(super) fn rolling_sharpe(ctx: &CommandContext<'_>, payload: &Value) -> Result<Value, String> {
    let args: RollingPayload = parse_args("rolling-sharpe", payload)?;
    let window = args
        .window
        .ok_or_else(|| "rolling-sharpe requires window".to_string())?;
    let cfg = args.overrides.apply(ctx.config.metrics_config()?)?;
    let raw = resolve_returns(&args.series, ctx.series)?;
    let values = stats::rolling_sharpe(&raw, window, &cfg)?;
    Ok(json!({ "window": window, "values": values }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BenchmarkPayload {
    #[serde(flatten)]
    series: SeriesArgs,
    #[serde(flatten)]
    overrides: MetricOverrides,
    benchmark: Option<Vec<Option<f64>>>,
    benchmark_csv: Option<String>,
}

pub(super) fn benchmark(ctx: &CommandContext<'_>, payload: &Value) -> Result<Value, String> {
    let args: BenchmarkPayload = parse_args("benchmark", payload)?;
    let cfg = args.overrides.apply(ctx.config.metrics_config()?)?;
    let returns = resolve_returns(&args.series, ctx.series)?;
    let bench: Vec<f64> = match (&args.benchmark, &args.benchmark_csv) {
        (Some(values), _) => values.iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
        (None, Some(path)) => ctx.series.read_returns_csv(Path::new(path))?,
        (None, None) => return Err("benchmark requires benchmark or benchmark_csv".to_string()),
    };
    if returns.len() != bench.len() {
        return Err(format!(
            "returns and benchmark length mismatch: {} vs {}",
            returns.len(),
            bench.len()
        ));
    }

    // Pairs with a gap on either side are dropped together.
    let (paired_returns, paired_bench): (Vec<f64>, Vec<f64>) = returns
        .iter()
        .zip(&bench)
        .filter(|(r, b)| r.is_finite() && b.is_finite())
        .map(|(r, b)| (*r, *b))
        .unzip();
    let dropped = returns.len() - paired_returns.len();

    let relative = BenchmarkStats::compute(&paired_returns, &paired_bench, &cfg)?;
    let mut data = to_data(&relative)?;
    if let Value::Object(map) = &mut data {
        map.insert("dropped".to_string(), json!(dropped));
    }
    Ok(data)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VarPayload {
    #[serde(flatten)]
    series: SeriesArgs,
    confidence: Option<f64>,
    method: Option<String>,
}

pub(super) fn value_at_risk(ctx: &CommandContext<'_>, payload: &Value) -> Result<Value, String> {
    let args: VarPayload = parse_args("var", payload)?;
    let cfg = ctx.config.metrics_config()?;
    let confidence = args.confidence.unwrap_or(cfg.var_confidence);
    let method = VarMethod::parse(args.method.as_deref().unwrap_or("historical"))?;
    let (clean, _) = clean_returns(&resolve_returns(&args.series, ctx.series)?);
    to_data(&estimate(&clean, confidence, method)?)
}
