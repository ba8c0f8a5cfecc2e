use super::inputs::{merge_overrides, parse_args, to_data};
use super::CommandContext;
use arena_domain::entities::account::AccountState;
use arena_domain::services::guardrails::TradingGuardrails;
use arena_domain::value_objects::decision::TradeDecision;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct GuardrailPayload {
    decision: TradeDecision,
    account: AccountState,
    #[serde(default)]
    limits: Option<Value>,
}

pub(super) fn guardrail_check(ctx: &CommandContext<'_>, payload: &Value) -> Result<Value, String> {
    let args: GuardrailPayload = parse_args("guardrail-check", payload)?;
    let limits = merge_overrides(&ctx.config.guardrail_limits(), args.limits.as_ref(), "limits")?;
    let guardrails = TradingGuardrails::new(limits)?;

    let verdict = guardrails.check(&args.decision, &args.account);
    for violation in &verdict.violations {
        metrics::counter!("arena.guardrails.violations_total", "rule" => violation.rule)
            .increment(1);
    }
    tracing::info!(
        symbol = %verdict.symbol,
        action = verdict.action.as_str(),
        approved = verdict.approved,
        clamped = verdict.clamped,
        violations = verdict.violations.len(),
        "guardrail verdict"
    );
    to_data(&verdict)
}
