//! Command handlers and the string-keyed dispatch table the worker routes through.

mod evaluation;
mod guardrails;
pub mod inputs;
mod portfolio;
mod returns;

use crate::config::Config;
use arena_domain::repositories::series::SeriesReader;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Instant;

pub struct CommandContext<'a> {
    pub config: &'a Config,
    pub series: &'a dyn SeriesReader,
}

pub type CommandHandler = fn(&CommandContext<'_>, &Value) -> Result<Value, String>;

const COMMANDS: &[(&str, CommandHandler)] = &[
    ("returns-stats", returns::returns_stats),
    ("drawdowns", portfolio::drawdowns),
    ("rolling-sharpe", returns::rolling_sharpe),
    ("benchmark", returns::benchmark),
    ("var", returns::value_at_risk),
    ("portfolio-metrics", portfolio::portfolio_metrics),
    ("analyze", portfolio::analyze),
    ("guardrail-check", guardrails::guardrail_check),
    ("evaluate", evaluation::evaluate),
    ("commands", list_commands),
];

pub fn dispatch_table() -> BTreeMap<&'static str, CommandHandler> {
    COMMANDS.iter().copied().collect()
}

pub fn lookup(name: &str) -> Option<CommandHandler> {
    COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .map(|(_, handler)| *handler)
}

pub fn command_names() -> Vec<&'static str> {
    COMMANDS.iter().map(|(name, _)| *name).collect()
}

fn list_commands(_ctx: &CommandContext<'_>, _payload: &Value) -> Result<Value, String> {
    Ok(json!({ "commands": command_names() }))
}

/// Runs one command inside a `command` span and records call metrics.
pub fn run_command(ctx: &CommandContext<'_>, name: &str, payload: &Value) -> Result<Value, String> {
    let handler = lookup(name).ok_or_else(|| format!("unknown command: {name}"))?;
    let span = tracing::info_span!("command", name = %name);
    let _enter = span.enter();

    let start = Instant::now();
    let result = handler(ctx, payload);
    let elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0;
    let result_label = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "arena.command.calls_total",
        "command" => name.to_string(),
        "result" => result_label
    )
    .increment(1);
    metrics::histogram!("arena.command.duration_ms", "command" => name.to_string())
        .record(elapsed_ms);

    match &result {
        Ok(_) => tracing::debug!(elapsed_ms, "command finished"),
        Err(err) => tracing::warn!(elapsed_ms, error = %err, "command failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::{command_names, dispatch_table, lookup};

    #[test]
    fn table_has_unique_names() {
        let names = command_names();
        assert_eq!(dispatch_table().len(), names.len());
        assert!(names.contains(&"guardrail-check"));
        assert!(names.contains(&"commands"));
    }

    #[test]
    fn lookup_is_exact() {
        assert!(lookup("var").is_some());
        assert!(lookup("VAR").is_none());
        assert!(lookup("").is_none());
    }
}
