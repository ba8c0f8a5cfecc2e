use crate::entities::metrics::MetricsConfig;
use crate::services::drawdown::max_drawdown_duration;
use crate::services::returns::{returns_from_equity, ReturnsStats};
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::fill::Fill;
use chrono::DateTime;
use serde::Serialize;
use std::collections::BTreeMap;

const QTY_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStats {
    pub fills_total: usize,
    pub skipped_fills: usize,
    pub round_trips: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub payoff: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
    pub realized_pnl: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Book {
    qty: f64,
    /// Per-unit entry price, net of opening fees.
    avg_price: f64,
}

/// Realized outcome of one closing fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedLeg {
    pub timestamp: i64,
    pub symbol: String,
    pub quantity: f64,
    pub pnl: f64,
    pub flat: bool,
}

/// Average-cost ledger supporting long and short books per symbol.
#[derive(Debug, Default)]
pub struct FillLedger {
    books: BTreeMap<String, Book>,
    closed: Vec<ClosedLeg>,
    fills_total: usize,
    skipped: usize,
    total_fees: f64,
}

impl FillLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, fill: &Fill) {
        if !fill.is_valid() {
            self.skipped += 1;
            return;
        }
        self.fills_total += 1;
        self.total_fees += fill.fee;

        let sign = fill.side.sign();
        let book = self.books.entry(fill.symbol.clone()).or_default();

        let opening = book.qty.abs() < QTY_EPS || book.qty.signum() == sign;
        if opening {
            let eff_price = fill.price + sign * fill.fee / fill.quantity;
            let held = book.qty.abs();
            let new_qty = held + fill.quantity;
            book.avg_price = (book.avg_price * held + eff_price * fill.quantity) / new_qty;
            book.qty = sign * new_qty;
            return;
        }

        let held = book.qty.abs();
        let close_qty = fill.quantity.min(held);
        let close_fee = fill.fee * close_qty / fill.quantity;
        let direction = book.qty.signum();
        let pnl = close_qty * (fill.price - book.avg_price) * direction - close_fee;

        let remaining = held - close_qty;
        let flat = remaining < QTY_EPS;
        if flat {
            book.qty = 0.0;
            book.avg_price = 0.0;
        } else {
            book.qty = direction * remaining;
        }

        self.closed.push(ClosedLeg {
            timestamp: fill.timestamp,
            symbol: fill.symbol.clone(),
            quantity: close_qty,
            pnl,
            flat,
        });

        let reopen = fill.quantity - close_qty;
        if reopen > QTY_EPS {
            let open_fee = fill.fee - close_fee;
            book.qty = sign * reopen;
            book.avg_price = fill.price + sign * open_fee / reopen;
        }
    }

    pub fn closed_legs(&self) -> &[ClosedLeg] {
        &self.closed
    }

    pub fn open_quantity(&self, symbol: &str) -> f64 {
        self.books.get(symbol).map(|b| b.qty).unwrap_or(0.0)
    }

    pub fn stats(&self) -> TradeStats {
        let mut stats = TradeStats {
            fills_total: self.fills_total,
            skipped_fills: self.skipped,
            total_fees: self.total_fees,
            ..TradeStats::default()
        };

        for leg in &self.closed {
            stats.realized_pnl += leg.pnl;
            if leg.flat {
                stats.round_trips += 1;
            }
            if leg.pnl > 0.0 {
                stats.wins += 1;
                stats.gross_profit += leg.pnl;
                stats.largest_win = stats.largest_win.max(leg.pnl);
            } else if leg.pnl < 0.0 {
                stats.losses += 1;
                stats.gross_loss += leg.pnl;
                stats.largest_loss = stats.largest_loss.min(leg.pnl);
            }
        }

        let decided = stats.wins + stats.losses;
        if decided > 0 {
            stats.win_rate = stats.wins as f64 / decided as f64;
        }
        if stats.wins > 0 {
            stats.avg_win = stats.gross_profit / stats.wins as f64;
        }
        if stats.losses > 0 {
            stats.avg_loss = stats.gross_loss / stats.losses as f64;
            stats.profit_factor = stats.gross_profit / stats.gross_loss.abs();
            stats.payoff = stats.avg_win / stats.avg_loss.abs();
        }
        stats
    }
}

pub fn trade_stats(fills: &[Fill]) -> TradeStats {
    let mut ordered: Vec<&Fill> = fills.iter().collect();
    ordered.sort_by_key(|f| f.timestamp);
    let mut ledger = FillLedger::new();
    for fill in ordered {
        ledger.apply(fill);
    }
    ledger.stats()
}

/// Keeps the last point of each UTC calendar day.
pub fn resample_daily(points: &[EquityPoint]) -> Result<Vec<EquityPoint>, String> {
    let mut out: Vec<EquityPoint> = Vec::new();
    let mut current_day = None;
    for p in points {
        let day = DateTime::from_timestamp(p.timestamp, 0)
            .ok_or_else(|| format!("timestamp out of range: {}", p.timestamp))?
            .date_naive();
        if current_day == Some(day) {
            if let Some(last) = out.last_mut() {
                *last = *p;
            }
        } else {
            out.push(*p);
            current_day = Some(day);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub observations: usize,
    pub max_drawdown_duration_bars: u64,
    pub returns: ReturnsStats,
    pub trades: TradeStats,
}

impl PortfolioMetrics {
    pub fn compute(
        initial_capital: f64,
        equity: &[EquityPoint],
        fills: &[Fill],
        cfg: &MetricsConfig,
        daily: bool,
    ) -> Result<Self, String> {
        if equity.is_empty() {
            return Err("equity curve is empty".to_string());
        }
        if equity.iter().any(|p| !p.equity.is_finite()) {
            return Err("equity curve contains non-finite values".to_string());
        }

        let mut curve = equity.to_vec();
        curve.sort_by_key(|p| p.timestamp);
        let curve = if daily { resample_daily(&curve)? } else { curve };

        let first = curve[0].equity;
        let final_equity = curve[curve.len() - 1].equity;
        let base = if initial_capital.is_finite() && initial_capital > 0.0 {
            initial_capital
        } else {
            first
        };
        let total_pnl = final_equity - base;
        let total_return_pct = if base > 0.0 {
            total_pnl / base * 100.0
        } else {
            0.0
        };

        let returns = ReturnsStats::compute(&returns_from_equity(&curve), cfg)?;

        Ok(Self {
            initial_capital: base,
            final_equity,
            total_pnl,
            total_return_pct,
            observations: curve.len(),
            max_drawdown_duration_bars: max_drawdown_duration(&curve),
            returns,
            trades: trade_stats(fills),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::side::Side;

    fn fill(ts: i64, side: Side, qty: f64, price: f64, fee: f64) -> Fill {
        Fill {
            timestamp: ts,
            symbol: "BTC".to_string(),
            side,
            quantity: qty,
            price,
            fee,
        }
    }

    #[test]
    fn long_round_trip_with_fees() {
        let stats = trade_stats(&[
            fill(1, Side::Buy, 1.0, 100.0, 1.0),
            fill(2, Side::Sell, 1.0, 120.0, 1.0),
        ]);
        assert_eq!(stats.fills_total, 2);
        assert_eq!(stats.round_trips, 1);
        assert_eq!(stats.wins, 1);
        assert!((stats.realized_pnl - 18.0).abs() < 1e-9);
        assert!((stats.total_fees - 2.0).abs() < 1e-12);
        assert_eq!(stats.win_rate, 1.0);
        assert_eq!(stats.profit_factor, 0.0);
    }

    #[test]
    fn short_position_profits_when_price_falls() {
        let stats = trade_stats(&[
            fill(1, Side::Sell, 2.0, 50.0, 0.0),
            fill(2, Side::Buy, 2.0, 40.0, 0.0),
        ]);
        assert!((stats.realized_pnl - 20.0).abs() < 1e-9);
        assert_eq!(stats.round_trips, 1);
    }

    #[test]
    fn crossing_fill_closes_then_reopens() {
        let mut ledger = FillLedger::new();
        ledger.apply(&fill(1, Side::Buy, 1.0, 100.0, 0.0));
        ledger.apply(&fill(2, Side::Sell, 3.0, 110.0, 0.0));
        assert!((ledger.open_quantity("BTC") + 2.0).abs() < 1e-12);
        assert_eq!(ledger.closed_legs().len(), 1);
        assert!((ledger.closed_legs()[0].pnl - 10.0).abs() < 1e-9);

        ledger.apply(&fill(3, Side::Buy, 2.0, 100.0, 0.0));
        let stats = ledger.stats();
        assert!((stats.realized_pnl - 30.0).abs() < 1e-9);
        assert_eq!(stats.round_trips, 2);
    }

    #[test]
    fn partial_close_keeps_average_cost() {
        let stats = trade_stats(&[
            fill(1, Side::Buy, 1.0, 100.0, 0.0),
            fill(2, Side::Buy, 1.0, 200.0, 0.0),
            fill(3, Side::Sell, 1.0, 140.0, 0.0),
        ]);
        assert_eq!(stats.losses, 1);
        assert!((stats.realized_pnl + 10.0).abs() < 1e-9);
        assert_eq!(stats.round_trips, 0);
    }

    #[test]
    fn invalid_fills_are_skipped() {
        let stats = trade_stats(&[
            fill(1, Side::Buy, 0.0, 100.0, 0.0),
            fill(2, Side::Buy, 1.0, f64::NAN, 0.0),
            fill(3, Side::Buy, 1.0, 100.0, -1.0),
        ]);
        assert_eq!(stats.skipped_fills, 3);
        assert_eq!(stats.fills_total, 0);
    }

    #[test]
    fn profit_factor_and_payoff() {
        let stats = trade_stats(&[
            fill(1, Side::Buy, 1.0, 100.0, 0.0),
            fill(2, Side::Sell, 1.0, 130.0, 0.0),
            fill(3, Side::Buy, 1.0, 100.0, 0.0),
            fill(4, Side::Sell, 1.0, 90.0, 0.0),
        ]);
        assert!((stats.profit_factor - 3.0).abs() < 1e-9);
        assert!((stats.payoff - 3.0).abs() < 1e-9);
        assert!((stats.largest_loss + 10.0).abs() < 1e-9);
        assert_eq!(stats.win_rate, 0.5);
    }

    #[test]
    fn resample_daily_keeps_last_point_per_day() {
        let day = 86_400;
        let points = vec![
            EquityPoint { timestamp: 0, equity: 1.0 },
            EquityPoint { timestamp: 3_600, equity: 2.0 },
            EquityPoint { timestamp: day, equity: 3.0 },
            EquityPoint { timestamp: day + 60, equity: 4.0 },
            EquityPoint { timestamp: 2 * day, equity: 5.0 },
        ];
        let daily = resample_daily(&points).unwrap();
        let values: Vec<f64> = daily.iter().map(|p| p.equity).collect();
        assert_eq!(values, vec![2.0, 4.0, 5.0]);
    }

    #[test]
    fn metrics_measure_against_initial_capital() {
        let equity = EquityPoint::from_values(&[10_000.0, 10_500.0, 10_200.0, 11_000.0]);
        let metrics =
            PortfolioMetrics::compute(10_000.0, &equity, &[], &MetricsConfig::default(), false)
                .unwrap();
        assert!((metrics.total_pnl - 1_000.0).abs() < 1e-9);
        assert!((metrics.total_return_pct - 10.0).abs() < 1e-9);
        assert_eq!(metrics.observations, 4);
        assert_eq!(metrics.returns.periods, 3);
        assert_eq!(metrics.max_drawdown_duration_bars, 1);
        assert!(metrics.returns.max_drawdown > 0.0);
    }

    #[test]
    fn metrics_fall_back_to_first_point_without_capital() {
        let equity = EquityPoint::from_values(&[200.0, 220.0]);
        let metrics =
            PortfolioMetrics::compute(0.0, &equity, &[], &MetricsConfig::default(), false).unwrap();
        assert_eq!(metrics.initial_capital, 200.0);
        assert!((metrics.total_return_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn metrics_reject_empty_curve() {
        let err = PortfolioMetrics::compute(1.0, &[], &[], &MetricsConfig::default(), false)
            .expect_err("empty");
        assert!(err.contains("empty"));
    }
}
