use crate::entities::account::AccountState;
use crate::entities::risk::GuardrailLimits;
use crate::value_objects::decision::TradeDecision;
use crate::value_objects::trade_action::TradeAction;
use serde::Serialize;

const QTY_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailViolation {
    pub rule: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailVerdict {
    pub approved: bool,
    pub symbol: String,
    pub action: TradeAction,
    pub original_quantity: f64,
    pub adjusted_quantity: f64,
    pub clamped: bool,
    pub violations: Vec<GuardrailViolation>,
    pub warnings: Vec<String>,
}

impl GuardrailVerdict {
    fn violate(&mut self, rule: &'static str, message: String) {
        self.violations.push(GuardrailViolation { rule, message });
    }
}

#[derive(Debug, Clone)]
pub struct TradingGuardrails {
    limits: GuardrailLimits,
}

impl TradingGuardrails {
    pub fn new(limits: GuardrailLimits) -> Result<Self, String> {
        limits.validate()?;
        Ok(Self { limits })
    }

    pub fn limits(&self) -> &GuardrailLimits {
        &self.limits
    }

    pub fn check(&self, decision: &TradeDecision, account: &AccountState) -> GuardrailVerdict {
        let mut verdict = GuardrailVerdict {
            approved: false,
            symbol: decision.symbol.clone(),
            action: decision.action,
            original_quantity: decision.quantity,
            adjusted_quantity: 0.0,
            clamped: false,
            violations: Vec::new(),
            warnings: Vec::new(),
        };

        let side = match decision.action {
            TradeAction::Hold => {
                verdict.approved = true;
                return verdict;
            }
            TradeAction::Buy => Some(1.0),
            TradeAction::Sell => Some(-1.0),
            TradeAction::Close => None,
        };

        let price = decision.price;
        if !price.is_finite() || price <= 0.0 {
            verdict.violate("invalid_order", format!("price must be finite and > 0, got {price}"));
        }
        if decision.action != TradeAction::Close
            && (!decision.quantity.is_finite() || decision.quantity <= 0.0)
        {
            verdict.violate(
                "invalid_order",
                format!("quantity must be finite and > 0, got {}", decision.quantity),
            );
        }
        if !account.equity.is_finite() || account.equity <= 0.0 {
            verdict.violate(
                "invalid_order",
                format!("account equity must be > 0, got {}", account.equity),
            );
        }
        if !verdict.violations.is_empty() {
            return verdict;
        }

        if !self.limits.allows_symbol(&decision.symbol) {
            verdict.violate(
                "symbol_not_allowed",
                format!("{} is not in the allowed symbol list", decision.symbol),
            );
        }
        if let Some(confidence) = decision.confidence {
            if !confidence.is_finite() || confidence < self.limits.min_confidence {
                verdict.violate(
                    "low_confidence",
                    format!(
                        "confidence {confidence} below minimum {}",
                        self.limits.min_confidence
                    ),
                );
            }
        }

        let current = account.position_qty(&decision.symbol);
        let (direction, mut qty) = match side {
            Some(direction) => (direction, decision.quantity),
            None => {
                if current.abs() < QTY_EPS {
                    verdict.violate(
                        "invalid_order",
                        format!("no open position in {} to close", decision.symbol),
                    );
                    return verdict;
                }
                verdict.original_quantity = current.abs();
                (-current.signum(), current.abs())
            }
        };

        let reducing = current.abs() >= QTY_EPS && current.signum() != direction;
        let mut full_close = false;
        if reducing {
            if qty > current.abs() + QTY_EPS {
                verdict.warnings.push(format!(
                    "order crosses through flat; kept the closing {} of {}",
                    current.abs(),
                    qty
                ));
                qty = current.abs();
            }
            full_close = (qty - current.abs()).abs() < QTY_EPS;
        } else {
            self.check_risk_increasing(decision, account, direction, current, &mut verdict);
            qty = self.clamp_increasing(decision, account, direction, qty, &mut verdict);
        }

        if !full_close && qty * price < self.limits.min_trade_value {
            verdict.violate(
                "below_min_trade",
                format!(
                    "order notional {:.4} below minimum {}",
                    qty * price,
                    self.limits.min_trade_value
                ),
            );
        }

        if verdict.violations.is_empty() {
            verdict.adjusted_quantity = qty;
            verdict.approved = qty > QTY_EPS;
        }
        verdict
    }

    fn check_risk_increasing(
        &self,
        decision: &TradeDecision,
        account: &AccountState,
        direction: f64,
        current: f64,
        verdict: &mut GuardrailVerdict,
    ) {
        let drawdown = account.drawdown_pct();
        if !self.limits.allows_drawdown(drawdown) {
            verdict.violate(
                "max_drawdown",
                format!(
                    "drawdown {:.4} at or beyond limit {}",
                    drawdown, self.limits.max_drawdown_pct
                ),
            );
        }

        let daily_loss = account.daily_loss_pct();
        if !self.limits.allows_daily_loss(daily_loss) {
            verdict.violate(
                "daily_loss_limit",
                format!(
                    "daily loss {:.4} at or beyond limit {}",
                    daily_loss, self.limits.max_daily_loss_pct
                ),
            );
        }

        if !self.limits.allows_trade_count(account.trades_today) {
            verdict.violate(
                "max_trades_per_day",
                format!(
                    "{} trades today, limit {}",
                    account.trades_today, self.limits.max_trades_per_day
                ),
            );
        }

        if self.limits.cooldown_seconds > 0 {
            if let Some(last) = account.last_trade_for(&decision.symbol) {
                let elapsed = decision.timestamp.saturating_sub(last);
                if elapsed < self.limits.cooldown_seconds {
                    verdict.violate(
                        "cooldown",
                        format!(
                            "last {} trade {}s ago, cooldown {}s",
                            decision.symbol, elapsed, self.limits.cooldown_seconds
                        ),
                    );
                }
            }
        }

        if direction < 0.0 && current <= QTY_EPS && !self.limits.allow_short {
            verdict.violate(
                "short_not_allowed",
                format!("selling {} would open a short position", decision.symbol),
            );
        }
    }

    fn clamp_increasing(
        &self,
        decision: &TradeDecision,
        account: &AccountState,
        direction: f64,
        qty: f64,
        verdict: &mut GuardrailVerdict,
    ) -> f64 {
        let price = decision.price;
        let equity = account.equity;
        let mut qty = qty;

        let current_notional = account
            .position(&decision.symbol)
            .map(|p| p.notional())
            .unwrap_or(0.0);
        let position_room = (self.limits.max_position_pct * equity - current_notional).max(0.0);
        let max_by_position = position_room / price;
        if qty > max_by_position {
            verdict.warnings.push(format!(
                "quantity reduced from {qty} to {max_by_position} by position cap {}",
                self.limits.max_position_pct
            ));
            qty = max_by_position;
            verdict.clamped = true;
        }

        let exposure_room =
            (self.limits.max_total_exposure_pct * equity - account.gross_exposure()).max(0.0);
        let max_by_exposure = exposure_room / price;
        if qty > max_by_exposure {
            verdict.warnings.push(format!(
                "quantity reduced from {qty} to {max_by_exposure} by exposure cap {}",
                self.limits.max_total_exposure_pct
            ));
            qty = max_by_exposure;
            verdict.clamped = true;
        }

        if direction > 0.0 {
            let max_by_cash = account.cash.max(0.0) / price;
            if qty > max_by_cash {
                verdict.warnings.push(format!(
                    "quantity reduced from {qty} to {max_by_cash} by available cash"
                ));
                qty = max_by_cash;
                verdict.clamped = true;
            }
        }

        qty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::account::Position;
    use std::collections::BTreeMap;

    fn account(cash: f64, equity: f64) -> AccountState {
        AccountState {
            cash,
            equity,
            peak_equity: Some(equity),
            day_start_equity: Some(equity),
            positions: Vec::new(),
            trades_today: 0,
            last_trade_at: BTreeMap::new(),
        }
    }

    fn decision(action: TradeAction, quantity: f64, price: f64) -> TradeDecision {
        TradeDecision {
            symbol: "BTC".to_string(),
            action,
            quantity,
            price,
            confidence: None,
            timestamp: 1_000,
        }
    }

    fn guardrails() -> TradingGuardrails {
        TradingGuardrails::new(GuardrailLimits::default()).unwrap()
    }

    fn rules(verdict: &GuardrailVerdict) -> Vec<&'static str> {
        verdict.violations.iter().map(|v| v.rule).collect()
    }

    #[test]
    fn hold_is_always_approved() {
        let verdict = guardrails().check(
            &decision(TradeAction::Hold, 0.0, f64::NAN),
            &account(0.0, 0.0),
        );
        assert!(verdict.approved);
        assert_eq!(verdict.adjusted_quantity, 0.0);
    }

    #[test]
    fn small_buy_passes_unchanged() {
        let verdict = guardrails().check(
            &decision(TradeAction::Buy, 0.01, 20_000.0),
            &account(10_000.0, 10_000.0),
        );
        assert!(verdict.approved);
        assert!(!verdict.clamped);
        assert!((verdict.adjusted_quantity - 0.01).abs() < 1e-12);
    }

    #[test]
    fn buy_is_clamped_to_position_cap() {
        let verdict = guardrails().check(
            &decision(TradeAction::Buy, 1.0, 10_000.0),
            &account(10_000.0, 10_000.0),
        );
        assert!(verdict.approved);
        assert!(verdict.clamped);
        assert!((verdict.adjusted_quantity - 0.25).abs() < 1e-12);
        assert!(!verdict.warnings.is_empty());
    }

    #[test]
    fn buy_is_clamped_to_cash() {
        let limits = GuardrailLimits {
            max_position_pct: 1.0,
            ..GuardrailLimits::default()
        };
        let verdict = TradingGuardrails::new(limits).unwrap().check(
            &decision(TradeAction::Buy, 1.0, 100.0),
            &account(50.0, 1_000.0),
        );
        assert!(verdict.approved);
        assert!((verdict.adjusted_quantity - 0.5).abs() < 1e-12);
    }

    #[test]
    fn invalid_price_is_rejected() {
        let verdict = guardrails().check(
            &decision(TradeAction::Buy, 1.0, 0.0),
            &account(1_000.0, 1_000.0),
        );
        assert!(!verdict.approved);
        assert_eq!(rules(&verdict), vec!["invalid_order"]);
        assert_eq!(verdict.adjusted_quantity, 0.0);
    }

    #[test]
    fn drawdown_halts_new_risk_but_allows_close() {
        let mut acct = account(5_000.0, 7_500.0);
        acct.peak_equity = Some(10_000.0);
        acct.day_start_equity = Some(7_500.0);
        acct.positions.push(Position {
            symbol: "BTC".to_string(),
            quantity: 0.1,
            avg_price: 25_000.0,
            mark_price: None,
        });

        let buy = guardrails().check(&decision(TradeAction::Buy, 0.01, 25_000.0), &acct);
        assert!(!buy.approved);
        assert!(rules(&buy).contains(&"max_drawdown"));

        let close = guardrails().check(&decision(TradeAction::Close, 0.0, 25_000.0), &acct);
        assert!(close.approved);
        assert!((close.adjusted_quantity - 0.1).abs() < 1e-12);
        assert!((close.original_quantity - 0.1).abs() < 1e-12);
    }

    #[test]
    fn daily_loss_limit_blocks_increase() {
        let mut acct = account(10_000.0, 9_400.0);
        acct.peak_equity = Some(9_400.0);
        acct.day_start_equity = Some(10_000.0);
        let verdict = guardrails().check(&decision(TradeAction::Buy, 0.02, 1_000.0), &acct);
        assert_eq!(rules(&verdict), vec!["daily_loss_limit"]);
    }

    #[test]
    fn naked_sell_rejected_without_shorting() {
        let verdict = guardrails().check(
            &decision(TradeAction::Sell, 0.01, 20_000.0),
            &account(10_000.0, 10_000.0),
        );
        assert!(rules(&verdict).contains(&"short_not_allowed"));

        let limits = GuardrailLimits {
            allow_short: true,
            ..GuardrailLimits::default()
        };
        let verdict = TradingGuardrails::new(limits).unwrap().check(
            &decision(TradeAction::Sell, 0.01, 20_000.0),
            &account(10_000.0, 10_000.0),
        );
        assert!(verdict.approved);
    }

    #[test]
    fn oversized_sell_only_closes_the_long() {
        let mut acct = account(0.0, 10_000.0);
        acct.positions.push(Position {
            symbol: "BTC".to_string(),
            quantity: 0.2,
            avg_price: 20_000.0,
            mark_price: Some(20_000.0),
        });
        let verdict = guardrails().check(&decision(TradeAction::Sell, 0.5, 20_000.0), &acct);
        assert!(verdict.approved);
        assert!(!verdict.clamped);
        assert_eq!(verdict.warnings.len(), 1);
        assert!((verdict.adjusted_quantity - 0.2).abs() < 1e-12);
    }

    #[test]
    fn cooldown_and_trade_count() {
        let limits = GuardrailLimits {
            cooldown_seconds: 300,
            max_trades_per_day: 3,
            ..GuardrailLimits::default()
        };
        let mut acct = account(10_000.0, 10_000.0);
        acct.trades_today = 3;
        acct.last_trade_at.insert("btc".to_string(), 900);
        let verdict = TradingGuardrails::new(limits)
            .unwrap()
            .check(&decision(TradeAction::Buy, 0.01, 1_000.0), &acct);
        let r = rules(&verdict);
        assert!(r.contains(&"cooldown"));
        assert!(r.contains(&"max_trades_per_day"));
    }

    #[test]
    fn below_min_trade_and_symbol_and_confidence() {
        let limits = GuardrailLimits {
            allowed_symbols: vec!["ETH".to_string()],
            min_confidence: 0.6,
            ..GuardrailLimits::default()
        };
        let mut d = decision(TradeAction::Buy, 0.0001, 1_000.0);
        d.confidence = Some(0.4);
        let verdict = TradingGuardrails::new(limits)
            .unwrap()
            .check(&d, &account(10_000.0, 10_000.0));
        let r = rules(&verdict);
        assert!(r.contains(&"symbol_not_allowed"));
        assert!(r.contains(&"low_confidence"));
        assert!(r.contains(&"below_min_trade"));
        assert_eq!(verdict.adjusted_quantity, 0.0);
    }

    #[test]
    fn exposure_cap_leaves_no_room() {
        let mut acct = account(10_000.0, 10_000.0);
        acct.positions.push(Position {
            symbol: "ETH".to_string(),
            quantity: 5.0,
            avg_price: 2_000.0,
            mark_price: None,
        });
        let verdict = guardrails().check(&decision(TradeAction::Buy, 0.1, 1_000.0), &acct);
        assert_eq!(rules(&verdict), vec!["below_min_trade"]);
        assert!(!verdict.approved);
        assert_eq!(verdict.adjusted_quantity, 0.0);

        let limits = GuardrailLimits {
            min_trade_value: 0.0,
            ..GuardrailLimits::default()
        };
        let verdict = TradingGuardrails::new(limits)
            .unwrap()
            .check(&decision(TradeAction::Buy, 0.1, 1_000.0), &acct);
        assert!(verdict.violations.is_empty());
        assert!(verdict.clamped);
        assert!(!verdict.approved);
        assert_eq!(verdict.adjusted_quantity, 0.0);
    }

    #[test]
    fn close_without_position_is_invalid() {
        let verdict = guardrails().check(
            &decision(TradeAction::Close, 0.0, 100.0),
            &account(1_000.0, 1_000.0),
        );
        assert_eq!(rules(&verdict), vec!["invalid_order"]);
    }
}
