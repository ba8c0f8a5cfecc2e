use super::inputs::{
    parse_args, resolve_equity, resolve_fills, to_data, FillArgs, MetricOverrides, SeriesArgs,
};
use super::CommandContext;
use arena_domain::services::analyzers::{built_in_analyzers, run_all, AnalyzerInput};
use arena_domain::services::drawdown::{
    drawdown_segments, drawdown_series, max_drawdown, max_drawdown_duration,
};
use arena_domain::services::evaluation::DEFAULT_INITIAL_CAPITAL;
use arena_domain::services::portfolio::PortfolioMetrics;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DrawdownPayload {
    #[serde(flatten)]
    series: SeriesArgs,
    top_n: Option<usize>,
}

pub(super) fn drawdowns(ctx: &CommandContext<'_>, payload: &Value) -> Result<Value, String> {
    let args: DrawdownPayload = parse_args("drawdowns", payload)?;
    let top_n = args.top_n.unwrap_or_else(|| ctx.config.drawdown_top_n());
    let points = resolve_equity(&args.series, ctx.series, 1.0)?;
    if points.is_empty() {
        return Err("equity curve is empty".to_string());
    }
    let values: Vec<f64> = points.iter().map(|p| p.equity).collect();

    Ok(json!({
        "max_drawdown": max_drawdown(&values),
        "max_drawdown_duration_bars": max_drawdown_duration(&points),
        "segments": to_data(&drawdown_segments(&points, top_n))?,
        "series": drawdown_series(&values),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PortfolioPayload {
    #[serde(flatten)]
    series: SeriesArgs,
    #[serde(flatten)]
    fills: FillArgs,
    #[serde(flatten)]
    overrides: MetricOverrides,
    initial_capital: Option<f64>,
    daily: bool,
}

pub(super) fn portfolio_metrics(ctx: &CommandContext<'_>, payload: &Value) -> Result<Value, String> {
    let args: PortfolioPayload = parse_args("portfolio-metrics", payload)?;
    let cfg = args.overrides.apply(ctx.config.metrics_config()?)?;
    let base = args.initial_capital.unwrap_or(DEFAULT_INITIAL_CAPITAL);
    let equity = resolve_equity(&args.series, ctx.series, base)?;
    let fills = resolve_fills(&args.fills, ctx.series)?;

    let metrics = PortfolioMetrics::compute(
        args.initial_capital.unwrap_or(0.0),
        &equity,
        &fills,
        &cfg,
        args.daily,
    )?;
    if metrics.trades.skipped_fills > 0 {
        tracing::warn!(skipped = metrics.trades.skipped_fills, "skipped invalid fills");
    }
    to_data(&metrics)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalyzePayload {
    #[serde(flatten)]
    series: SeriesArgs,
    #[serde(flatten)]
    fills: FillArgs,
    top_n: Option<usize>,
}

pub(super) fn analyze(ctx: &CommandContext<'_>, payload: &Value) -> Result<Value, String> {
    let args: AnalyzePayload = parse_args("analyze", payload)?;
    let top_n = args.top_n.unwrap_or_else(|| ctx.config.drawdown_top_n());
    let equity = resolve_equity(&args.series, ctx.series, DEFAULT_INITIAL_CAPITAL)?;
    let fills = resolve_fills(&args.fills, ctx.series)?;

    let analyzers = built_in_analyzers(top_n);
    let outputs = run_all(
        &analyzers,
        &AnalyzerInput {
            equity: &equity,
            fills: &fills,
        },
    )?;
    to_data(&outputs)
}
