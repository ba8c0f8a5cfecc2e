pub mod error;
pub mod logging;

use crate::error::WorkerError;
use arena_application::commands::{lookup, run_command, CommandContext};
use arena_application::config::{self, Config};
use arena_application::envelope;
use arena_application::payload::{csv_reference, parse_payload};
use arena_domain::repositories::payload::{PayloadLocation, PayloadSource};
use arena_domain::repositories::series::SeriesReader;
use arena_infrastructure::payload::SystemPayloadSource;
use arena_infrastructure::series::FilesystemSeriesReader;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "ARENA_CONFIG";

#[derive(Debug, Clone, Default)]
pub struct WorkerArgs {
    pub command: String,
    pub json_args: Option<String>,
    pub input: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOutput {
    pub envelope: Value,
    pub exit_code: i32,
}

impl WorkerOutput {
    /// The envelope as exactly one line of JSON.
    pub fn render(&self) -> String {
        serde_json::to_string(&self.envelope).unwrap_or_else(|_| {
            "{\"success\":false,\"command\":null,\"error\":\"failed to serialize envelope\"}"
                .to_string()
        })
    }
}

pub fn resolve_config_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| {
        std::env::var(CONFIG_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    })
}

/// A missing path means "all defaults".
pub fn load_config(path: Option<&Path>) -> Result<Config, WorkerError> {
    match path {
        Some(path) => config::load_config(path).map_err(WorkerError::Config),
        None => Ok(Config::default()),
    }
}

pub fn failure_output(command: Option<&str>, err: &WorkerError) -> WorkerOutput {
    let known = command.filter(|name| lookup(name).is_some());
    metrics::counter!("arena.worker.failures_total", "kind" => err.kind()).increment(1);
    WorkerOutput {
        envelope: envelope::failure(known, &err.to_string()),
        exit_code: err.exit_code(),
    }
}

/// Runs with the filesystem series reader and the process payload sources.
pub fn execute(args: &WorkerArgs, config: &Config) -> WorkerOutput {
    let sources = config
        .input_settings()
        .map_err(WorkerError::Config)
        .and_then(|settings| {
            SystemPayloadSource::new(settings.retry, settings.timeout_ms, settings.max_bytes)
                .map_err(WorkerError::Input)
        });
    match sources {
        Ok(payloads) => execute_with(args, config, &payloads, &FilesystemSeriesReader::new()),
        Err(err) => failure_output(Some(&args.command), &err),
    }
}

pub fn execute_with(
    args: &WorkerArgs,
    config: &Config,
    payloads: &dyn PayloadSource,
    series: &dyn SeriesReader,
) -> WorkerOutput {
    match dispatch(args, config, payloads, series) {
        Ok(data) => WorkerOutput {
            envelope: envelope::success(&args.command, data),
            exit_code: 0,
        },
        Err(err) => failure_output(Some(&args.command), &err),
    }
}

fn dispatch(
    args: &WorkerArgs,
    config: &Config,
    payloads: &dyn PayloadSource,
    series: &dyn SeriesReader,
) -> Result<Value, WorkerError> {
    if lookup(&args.command).is_none() {
        return Err(WorkerError::Usage(format!(
            "unknown command: {}",
            args.command
        )));
    }
    let payload = load_payload(args, payloads)?;
    let ctx = CommandContext { config, series };
    run_command(&ctx, &args.command, &payload).map_err(WorkerError::Command)
}

fn load_payload(args: &WorkerArgs, payloads: &dyn PayloadSource) -> Result<Value, WorkerError> {
    let raw = match (args.json_args.as_deref(), args.input.as_deref()) {
        (Some(_), Some(_)) => {
            return Err(WorkerError::Usage(
                "pass the payload either positionally or with --input, not both".to_string(),
            ))
        }
        (Some(raw), None) | (None, Some(raw)) => raw,
        (None, None) => return Ok(Value::Object(Map::new())),
    };

    let location = PayloadLocation::parse(raw);
    if let Some(reference) = csv_reference(&location) {
        return Ok(reference);
    }
    let text = payloads.fetch(&location).map_err(WorkerError::Input)?;
    parse_payload(&text).map_err(WorkerError::Usage)
}
