use crate::entities::metrics::MetricsConfig;
use crate::services::portfolio::PortfolioMetrics;
use crate::services::returns::EPS;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::fill::Fill;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoreWeights {
    pub total_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            total_return: 0.30,
            sharpe: 0.25,
            sortino: 0.15,
            max_drawdown: 0.20,
            win_rate: 0.10,
        }
    }
}

impl ScoreWeights {
    fn as_array(&self) -> [f64; 5] {
        [
            self.total_return,
            self.sharpe,
            self.sortino,
            self.max_drawdown,
            self.win_rate,
        ]
    }

    pub fn validate(&self) -> Result<(), String> {
        let weights = self.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("evaluation weights must be finite and >= 0".to_string());
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err("evaluation weights must not all be zero".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub name: String,
    pub initial_capital: f64,
    pub equity: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
}

/// Compounds `returns` from `initial_capital`; the first point is the capital itself.
pub fn equity_from_returns(initial_capital: f64, returns: &[f64]) -> Vec<EquityPoint> {
    let mut equity = initial_capital;
    let mut points = Vec::with_capacity(returns.len() + 1);
    points.push(EquityPoint {
        timestamp: 0,
        equity,
    });
    for (idx, r) in returns.iter().enumerate() {
        equity *= 1.0 + r;
        points.push(EquityPoint {
            timestamp: idx as i64 + 1,
            equity,
        });
    }
    points
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricScores {
    pub total_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub eligible: bool,
    pub composite_score: f64,
    pub scores: MetricScores,
    pub metrics: PortfolioMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    pub weights: ScoreWeights,
    pub min_trades: usize,
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}

fn normalize(value: f64, (lo, hi): (f64, f64), invert: bool) -> f64 {
    if hi - lo < EPS {
        return 0.5;
    }
    let score = (value - lo) / (hi - lo);
    if invert {
        1.0 - score
    } else {
        score
    }
}

pub fn evaluate(
    agents: &[AgentRecord],
    weights: &ScoreWeights,
    min_trades: usize,
    cfg: &MetricsConfig,
) -> Result<Leaderboard, String> {
    weights.validate()?;
    if agents.is_empty() {
        return Err("evaluation needs at least one agent".to_string());
    }
    let mut seen = BTreeSet::new();
    for agent in agents {
        if !seen.insert(agent.name.as_str()) {
            return Err(format!("duplicate agent name: {}", agent.name));
        }
    }

    let metrics = agents
        .iter()
        .map(|agent| {
            PortfolioMetrics::compute(
                agent.initial_capital,
                &agent.equity,
                &agent.fills,
                cfg,
                false,
            )
            .map_err(|err| format!("agent {}: {err}", agent.name))
        })
        .collect::<Result<Vec<_>, String>>()?;

    let column = |f: fn(&PortfolioMetrics) -> f64| -> Vec<f64> { metrics.iter().map(f).collect() };
    let ret_range = min_max(&column(|m| m.total_return_pct));
    let sharpe_range = min_max(&column(|m| m.returns.sharpe));
    let sortino_range = min_max(&column(|m| m.returns.sortino));
    let dd_range = min_max(&column(|m| m.returns.max_drawdown));
    let win_range = min_max(&column(|m| m.trades.win_rate));

    let w = weights.as_array();
    let weight_sum: f64 = w.iter().sum();

    let mut entries: Vec<LeaderboardEntry> = agents
        .iter()
        .zip(metrics)
        .map(|(agent, m)| {
            let scores = MetricScores {
                total_return: normalize(m.total_return_pct, ret_range, false),
                sharpe: normalize(m.returns.sharpe, sharpe_range, false),
                sortino: normalize(m.returns.sortino, sortino_range, false),
                max_drawdown: normalize(m.returns.max_drawdown, dd_range, true),
                win_rate: normalize(m.trades.win_rate, win_range, false),
            };
            let s = [
                scores.total_return,
                scores.sharpe,
                scores.sortino,
                scores.max_drawdown,
                scores.win_rate,
            ];
            let composite = w.iter().zip(s).map(|(w, s)| w * s).sum::<f64>() / weight_sum;
            LeaderboardEntry {
                rank: 0,
                name: agent.name.clone(),
                eligible: m.trades.fills_total >= min_trades,
                composite_score: composite,
                scores,
                metrics: m,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.eligible
            .cmp(&a.eligible)
            .then_with(|| b.composite_score.total_cmp(&a.composite_score))
            .then_with(|| a.name.cmp(&b.name))
    });
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }

    Ok(Leaderboard {
        entries,
        weights: *weights,
        min_trades,
    })
}
