use super::inputs::{
    merge_overrides, parse_args, resolve_equity, resolve_fills, resolve_returns, to_data, FillArgs,
    MetricOverrides, SeriesArgs,
};
use super::CommandContext;
use arena_domain::services::evaluation::{
    equity_from_returns, evaluate as rank_agents, AgentRecord, DEFAULT_INITIAL_CAPITAL,
};
use arena_domain::services::returns::clean_returns;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct AgentPayload {
    name: String,
    #[serde(default)]
    initial_capital: Option<f64>,
    #[serde(flatten)]
    series: SeriesArgs,
    #[serde(flatten)]
    fills: FillArgs,
}

#[derive(Debug, Deserialize)]
struct EvaluatePayload {
    agents: Vec<AgentPayload>,
    #[serde(default)]
    weights: Option<Value>,
    #[serde(default)]
    min_trades: Option<usize>,
    #[serde(flatten)]
    overrides: MetricOverrides,
}

fn agent_record(ctx: &CommandContext<'_>, agent: &AgentPayload) -> Result<AgentRecord, String> {
    let capital = agent.initial_capital.unwrap_or(DEFAULT_INITIAL_CAPITAL);
    let equity = if agent.series.has_returns() {
        let (clean, _) = clean_returns(&resolve_returns(&agent.series, ctx.series)?);
        equity_from_returns(capital, &clean)
    } else {
        resolve_equity(&agent.series, ctx.series, capital)?
    };
    Ok(AgentRecord {
        name: agent.name.clone(),
        initial_capital: capital,
        equity,
        fills: resolve_fills(&agent.fills, ctx.series)?,
    })
}

pub(super) fn evaluate(ctx: &CommandContext<'_>, payload: &Value) -> Result<Value, String> {
    let args: EvaluatePayload = parse_args("evaluate", payload)?;
    let cfg = args.overrides.apply(ctx.config.metrics_config()?)?;
    let weights = merge_overrides(&ctx.config.score_weights(), args.weights.as_ref(), "weights")?;
    let min_trades = args.min_trades.unwrap_or_else(|| ctx.config.min_trades());

    let agents = args
        .agents
        .iter()
        .map(|agent| {
            agent_record(ctx, agent).map_err(|err| format!("agent {}: {err}", agent.name))
        })
        .collect::<Result<Vec<_>, String>>()?;

    let leaderboard = rank_agents(&agents, &weights, min_trades, &cfg)?;
    tracing::info!(
        agents = leaderboard.entries.len(),
        leader = leaderboard.entries.first().map(|e| e.name.as_str()).unwrap_or(""),
        "evaluation ranked"
    );
    to_data(&leaderboard)
}
