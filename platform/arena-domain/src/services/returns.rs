use crate::entities::metrics::MetricsConfig;
use crate::services::var::{historical_var, quantile_sorted};
use crate::value_objects::equity_point::EquityPoint;
use serde::Serialize;

/// Dispersion below this is treated as zero when dividing.
pub(crate) const EPS: f64 = 1e-12;

pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter_map(|pair| {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.is_finite() && prev > 0.0 && curr.is_finite() {
                Some(curr / prev - 1.0)
            } else {
                None
            }
        })
        .collect()
}

pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter_map(|pair| {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.is_finite() && prev > 0.0 && curr.is_finite() && curr > 0.0 {
                Some((curr / prev).ln())
            } else {
                None
            }
        })
        .collect()
}

pub fn returns_from_equity(points: &[EquityPoint]) -> Vec<f64> {
    let values: Vec<f64> = points.iter().map(|p| p.equity).collect();
    simple_returns(&values)
}

/// Drops non-finite values, returning the survivors and how many were dropped.
pub fn clean_returns(raw: &[f64]) -> (Vec<f64>, usize) {
    let clean: Vec<f64> = raw.iter().copied().filter(|r| r.is_finite()).collect();
    let dropped = raw.len() - clean.len();
    (clean, dropped)
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values
        .iter()
        .map(|v| {
            let diff = v - m;
            diff * diff
        })
        .sum::<f64>()
        / (values.len() as f64 - 1.0);
    var.sqrt()
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn sharpe(returns: &[f64], cfg: &MetricsConfig) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = sample_std(returns);
    if std < EPS {
        return 0.0;
    }
    let excess = mean(returns) - cfg.risk_free_per_period();
    finite_or_zero(excess / std * cfg.periods_per_year.sqrt())
}

fn sortino(returns: &[f64], cfg: &MetricsConfig) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let rf = cfg.risk_free_per_period();
    let downside = returns
        .iter()
        .map(|r| {
            let d = (r - rf).min(0.0);
            d * d
        })
        .sum::<f64>()
        / returns.len() as f64;
    let dd = downside.sqrt();
    if dd < EPS {
        return 0.0;
    }
    finite_or_zero((mean(returns) - rf) / dd * cfg.periods_per_year.sqrt())
}

/// Largest peak-to-trough loss of the wealth curve compounded from 1.0.
/// A period that takes wealth to zero or below is a full loss.
pub fn max_drawdown_from_returns(returns: &[f64]) -> f64 {
    let mut log_wealth = 0.0f64;
    let mut log_peak = 0.0f64;
    let mut max_dd = 0.0f64;
    for r in returns {
        if *r <= -1.0 {
            return 1.0;
        }
        log_wealth += r.ln_1p();
        if log_wealth > log_peak {
            log_peak = log_wealth;
        }
        let dd = (-(log_wealth - log_peak).exp_m1()).clamp(0.0, 1.0);
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

/// Compounded growth factor; stays at zero once wealth is wiped out.
fn growth_factor(returns: &[f64]) -> f64 {
    let mut growth = 1.0f64;
    for r in returns {
        if *r <= -1.0 {
            return 0.0;
        }
        growth *= 1.0 + r;
    }
    growth
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReturnsStats {
    pub periods: usize,
    pub total_return: f64,
    pub annualized_return: f64,
    pub mean_return: f64,
    pub volatility: f64,
    pub annualized_volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub var: f64,
    pub cvar: f64,
    pub omega: f64,
    pub best: f64,
    pub worst: f64,
    pub hit_rate: f64,
    pub skew: f64,
    pub kurtosis: f64,
    pub tail_ratio: f64,
}

impl ReturnsStats {
    /// Non-finite returns are ignored.
    pub fn compute(returns: &[f64], cfg: &MetricsConfig) -> Result<Self, String> {
        cfg.validate()?;
        let (returns, _) = clean_returns(returns);
        let n = returns.len();
        if n == 0 {
            return Ok(Self::default());
        }
        let ppy = cfg.periods_per_year;

        let growth = growth_factor(&returns);
        let total_return = finite_or_zero(growth - 1.0);
        let annualized_return = if growth <= 0.0 {
            -1.0
        } else {
            finite_or_zero(growth.powf(ppy / n as f64) - 1.0)
        };

        let mean_return = finite_or_zero(mean(&returns));
        let volatility = finite_or_zero(sample_std(&returns));
        let max_drawdown = max_drawdown_from_returns(&returns);
        let calmar = if max_drawdown < EPS {
            0.0
        } else {
            finite_or_zero(annualized_return / max_drawdown)
        };

        let tail = historical_var(&returns, cfg.var_confidence)?;

        let gains: f64 = returns.iter().map(|r| r.max(0.0)).sum();
        let losses: f64 = returns.iter().map(|r| (-r).max(0.0)).sum();
        let omega = if losses < EPS {
            0.0
        } else {
            finite_or_zero(gains / losses)
        };

        let best = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let worst = returns.iter().copied().fold(f64::INFINITY, f64::min);
        let hit_rate = returns.iter().filter(|r| **r > 0.0).count() as f64 / n as f64;

        let (skew, kurtosis) = moments(&returns, mean_return);

        let mut sorted = returns.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let q95 = quantile_sorted(&sorted, 0.95);
        let q05 = quantile_sorted(&sorted, 0.05);
        let tail_ratio = if q05.abs() < EPS {
            0.0
        } else {
            finite_or_zero(q95.abs() / q05.abs())
        };

        Ok(Self {
            periods: n,
            total_return,
            annualized_return,
            mean_return,
            volatility,
            annualized_volatility: finite_or_zero(volatility * ppy.sqrt()),
            sharpe: sharpe(&returns, cfg),
            sortino: sortino(&returns, cfg),
            calmar,
            max_drawdown,
            var: finite_or_zero(tail.var),
            cvar: finite_or_zero(tail.cvar),
            omega,
            best,
            worst,
            hit_rate,
            skew,
            kurtosis,
            tail_ratio,
        })
    }
}

fn moments(returns: &[f64], mean: f64) -> (f64, f64) {
    let n = returns.len() as f64;
    let (mut m2, mut m3, mut m4) = (0.0f64, 0.0f64, 0.0f64);
    for r in returns {
        let d = r - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    m2 /= n;
    m3 /= n;
    m4 /= n;
    if m2 < EPS * EPS {
        return (0.0, 0.0);
    }
    (
        finite_or_zero(m3 / m2.powf(1.5)),
        finite_or_zero(m4 / (m2 * m2) - 3.0),
    )
}

/// Sharpe over each trailing window; `None` until the window fills or when
/// the window holds a non-finite return.
pub fn rolling_sharpe(
    returns: &[f64],
    window: usize,
    cfg: &MetricsConfig,
) -> Result<Vec<Option<f64>>, String> {
    cfg.validate()?;
    if window < 2 {
        return Err("rolling window must be >= 2".to_string());
    }
    let out = (0..returns.len())
        .map(|idx| {
            if idx + 1 < window {
                return None;
            }
            let slice = &returns[idx + 1 - window..=idx];
            if slice.iter().any(|r| !r.is_finite()) {
                return None;
            }
            Some(sharpe(slice, cfg))
        })
        .collect();
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BenchmarkStats {
    pub periods: usize,
    pub alpha: f64,
    pub beta: f64,
    pub correlation: f64,
    pub tracking_error: f64,
    pub information_ratio: f64,
    pub up_capture: f64,
    pub down_capture: f64,
}

impl BenchmarkStats {
    pub fn compute(returns: &[f64], benchmark: &[f64], cfg: &MetricsConfig) -> Result<Self, String> {
        cfg.validate()?;
        if returns.len() != benchmark.len() {
            return Err(format!(
                "returns and benchmark length mismatch: {} vs {}",
                returns.len(),
                benchmark.len()
            ));
        }
        if returns.len() < 2 {
            return Err("benchmark comparison needs at least 2 periods".to_string());
        }
        if returns.iter().chain(benchmark).any(|v| !v.is_finite()) {
            return Err("returns and benchmark must be finite".to_string());
        }

        let n = returns.len();
        let ppy = cfg.periods_per_year;
        let mr = mean(returns);
        let mb = mean(benchmark);
        let cov = returns
            .iter()
            .zip(benchmark)
            .map(|(r, b)| (r - mr) * (b - mb))
            .sum::<f64>()
            / (n as f64 - 1.0);
        let sr = sample_std(returns);
        let sb = sample_std(benchmark);

        let beta = if sb < EPS { 0.0 } else { cov / (sb * sb) };
        let correlation = if sr < EPS || sb < EPS {
            0.0
        } else {
            (cov / (sr * sb)).clamp(-1.0, 1.0)
        };

        let active: Vec<f64> = returns.iter().zip(benchmark).map(|(r, b)| r - b).collect();
        let tracking_error = sample_std(&active) * ppy.sqrt();
        let information_ratio = if tracking_error < EPS {
            0.0
        } else {
            mean(&active) * ppy / tracking_error
        };

        Ok(Self {
            periods: n,
            alpha: (mr - beta * mb) * ppy,
            beta,
            correlation,
            tracking_error,
            information_ratio,
            up_capture: capture(returns, benchmark, |b| b > 0.0),
            down_capture: capture(returns, benchmark, |b| b < 0.0),
        })
    }
}

fn capture(returns: &[f64], benchmark: &[f64], keep: impl Fn(f64) -> bool) -> f64 {
    let (picked_r, picked_b): (Vec<f64>, Vec<f64>) = returns
        .iter()
        .zip(benchmark)
        .filter(|(_, b)| keep(**b))
        .map(|(r, b)| (*r, *b))
        .unzip();
    let mb = mean(&picked_b);
    if picked_b.is_empty() || mb.abs() < EPS {
        return 0.0;
    }
    mean(&picked_r) / mb
}
