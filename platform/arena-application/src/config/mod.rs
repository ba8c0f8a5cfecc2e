use arena_domain::entities::metrics::{MetricsConfig, DEFAULT_PERIODS_PER_YEAR, DEFAULT_VAR_CONFIDENCE};
use arena_domain::entities::risk::GuardrailLimits;
use arena_domain::services::evaluation::ScoreWeights;
use arena_domain::services::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_DRAWDOWN_TOP_N: usize = 5;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported log format: {other} (expected text|json)")),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub metrics: Option<MetricsSection>,
    pub guardrails: Option<GuardrailLimits>,
    pub evaluation: Option<EvaluationSection>,
    pub input: Option<InputSection>,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    pub risk_free_rate: Option<f64>,
    pub periods_per_year: Option<f64>,
    pub var_confidence: Option<f64>,
    pub drawdown_top_n: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EvaluationSection {
    pub total_return: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub win_rate: Option<f64>,
    pub min_trades: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InputSection {
    pub retry_max_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub max_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

/// Resolved `[input]` settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSettings {
    pub retry: RetryPolicy,
    pub timeout_ms: u64,
    pub max_bytes: u64,
}

impl Config {
    pub fn metrics_config(&self) -> Result<MetricsConfig, String> {
        let section = self.metrics.clone().unwrap_or_default();
        let cfg = MetricsConfig {
            risk_free_rate: section.risk_free_rate.unwrap_or(0.0),
            periods_per_year: section.periods_per_year.unwrap_or(DEFAULT_PERIODS_PER_YEAR),
            var_confidence: section.var_confidence.unwrap_or(DEFAULT_VAR_CONFIDENCE),
        };
        cfg.validate().map_err(|err| format!("invalid [metrics]: {err}"))?;
        Ok(cfg)
    }

    pub fn drawdown_top_n(&self) -> usize {
        self.metrics
            .as_ref()
            .and_then(|m| m.drawdown_top_n)
            .unwrap_or(DEFAULT_DRAWDOWN_TOP_N)
    }

    pub fn guardrail_limits(&self) -> GuardrailLimits {
        self.guardrails.clone().unwrap_or_default()
    }

    pub fn score_weights(&self) -> ScoreWeights {
        let defaults = ScoreWeights::default();
        match &self.evaluation {
            None => defaults,
            Some(section) => ScoreWeights {
                total_return: section.total_return.unwrap_or(defaults.total_return),
                sharpe: section.sharpe.unwrap_or(defaults.sharpe),
                sortino: section.sortino.unwrap_or(defaults.sortino),
                max_drawdown: section.max_drawdown.unwrap_or(defaults.max_drawdown),
                win_rate: section.win_rate.unwrap_or(defaults.win_rate),
            },
        }
    }

    pub fn min_trades(&self) -> usize {
        self.evaluation
            .as_ref()
            .and_then(|e| e.min_trades)
            .unwrap_or(0)
    }

    pub fn input_settings(&self) -> Result<InputSettings, String> {
        let section = self.input.clone().unwrap_or_default();
        let defaults = RetryPolicy::default();
        let retry = RetryPolicy::new(
            section.retry_max_attempts.unwrap_or(defaults.max_attempts),
            section.retry_base_delay_ms.unwrap_or(defaults.base_delay_ms),
        )
        .map_err(|err| format!("invalid [input]: {err}"))?;
        let max_bytes = section.max_bytes.unwrap_or(DEFAULT_MAX_BYTES);
        if max_bytes == 0 {
            return Err("invalid [input]: max_bytes must be > 0".to_string());
        }
        Ok(InputSettings {
            retry,
            timeout_ms: section.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            max_bytes,
        })
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn log_format(&self) -> LogFormat {
        self.logging
            .as_ref()
            .and_then(|l| l.format)
            .unwrap_or_default()
    }

    /// Checks every table so a bad config fails before any command runs.
    pub fn validate(&self) -> Result<(), String> {
        self.metrics_config()?;
        self.guardrail_limits()
            .validate()
            .map_err(|err| format!("invalid [guardrails]: {err}"))?;
        self.score_weights()
            .validate()
            .map_err(|err| format!("invalid [evaluation]: {err}"))?;
        self.input_settings()?;
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    config.validate()?;
    Ok((config, contents))
}
