use crate::services::drawdown::{drawdown_segments, max_drawdown, max_drawdown_duration};
use crate::services::portfolio::FillLedger;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::fill::Fill;
use crate::value_objects::side::Side;
use std::collections::BTreeMap;

pub trait Analyzer {
    fn name(&self) -> &'static str;
    fn analyze(&self, input: &AnalyzerInput) -> Result<serde_json::Value, String>;
}

pub struct AnalyzerInput<'a> {
    pub equity: &'a [EquityPoint],
    pub fills: &'a [Fill],
}

pub fn built_in_analyzers(top_n: usize) -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(TradeStatsAnalyzer),
        Box::new(DrawdownAnalyzer { top_n }),
    ]
}

/// Runs every analyzer, keyed by analyzer name.
pub fn run_all(
    analyzers: &[Box<dyn Analyzer>],
    input: &AnalyzerInput,
) -> Result<BTreeMap<String, serde_json::Value>, String> {
    let mut out = BTreeMap::new();
    for analyzer in analyzers {
        let value = analyzer
            .analyze(input)
            .map_err(|err| format!("analyzer {} failed: {err}", analyzer.name()))?;
        out.insert(analyzer.name().to_string(), value);
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy)]
pub struct TradeStatsAnalyzer;

impl Analyzer for TradeStatsAnalyzer {
    fn name(&self) -> &'static str {
        "trade_stats"
    }

    fn analyze(&self, input: &AnalyzerInput) -> Result<serde_json::Value, String> {
        let mut ordered: Vec<&Fill> = input.fills.iter().collect();
        ordered.sort_by_key(|f| f.timestamp);

        let mut buy_count = 0u64;
        let mut sell_count = 0u64;
        let mut turnover = 0.0f64;
        let mut per_symbol: BTreeMap<&str, u64> = BTreeMap::new();
        let mut ledger = FillLedger::new();
        let mut entry_ts: BTreeMap<String, i64> = BTreeMap::new();
        let mut closed_durations: Vec<i64> = Vec::new();

        for fill in ordered {
            let closed_before = ledger.closed_legs().len();
            ledger.apply(fill);
            if !fill.is_valid() {
                continue;
            }
            match fill.side {
                Side::Buy => buy_count += 1,
                Side::Sell => sell_count += 1,
            }
            turnover += fill.quantity * fill.price;
            *per_symbol.entry(fill.symbol.as_str()).or_default() += 1;

            let open = ledger.open_quantity(&fill.symbol);
            let closed_flat = ledger.closed_legs().len() > closed_before
                && ledger.closed_legs().last().map(|leg| leg.flat).unwrap_or(false);
            if closed_flat {
                if let Some(entry) = entry_ts.remove(&fill.symbol) {
                    closed_durations.push(fill.timestamp.saturating_sub(entry));
                }
            }
            if open != 0.0 {
                entry_ts.entry(fill.symbol.clone()).or_insert(fill.timestamp);
            }
        }

        let stats = ledger.stats();
        let avg_holding_seconds = if closed_durations.is_empty() {
            None
        } else {
            let total: i64 = closed_durations.iter().sum();
            Some(total as f64 / closed_durations.len() as f64)
        };

        Ok(serde_json::json!({
            "name": self.name(),
            "fills": {
                "buy_count": buy_count,
                "sell_count": sell_count,
                "skipped": stats.skipped_fills,
                "per_symbol": per_symbol,
                "turnover": turnover,
            },
            "pnl": {
                "wins": stats.wins,
                "losses": stats.losses,
                "avg_win": stats.avg_win,
                "avg_loss": stats.avg_loss,
                "payoff": stats.payoff,
                "win_rate": stats.win_rate,
                "realized": stats.realized_pnl,
            },
            "costs": {
                "total_fee": stats.total_fees,
            },
            "holding": {
                "round_trips_closed": closed_durations.len(),
                "avg_holding_seconds": avg_holding_seconds,
            },
        }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DrawdownAnalyzer {
    pub top_n: usize,
}

impl Analyzer for DrawdownAnalyzer {
    fn name(&self) -> &'static str {
        "drawdown"
    }

    fn analyze(&self, input: &AnalyzerInput) -> Result<serde_json::Value, String> {
        let values: Vec<f64> = input.equity.iter().map(|p| p.equity).collect();
        let top = drawdown_segments(input.equity, self.top_n);
        Ok(serde_json::json!({
            "name": self.name(),
            "max_drawdown_pct": max_drawdown(&values),
            "max_duration_bars": max_drawdown_duration(input.equity),
            "top": top,
        }))
    }
}
