use arena_application::config::LogFormat;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ARENA_LOG";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Env var first, then the config level, then `warn`.
pub fn filter_directive(env_value: Option<String>, config_level: Option<&str>) -> String {
    env_value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            config_level
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Installs the global subscriber. Logs always go to stderr.
pub fn init(config_level: Option<&str>, format: LogFormat) -> Result<(), String> {
    let directive = filter_directive(std::env::var(LOG_ENV).ok(), config_level);
    let env_filter = EnvFilter::try_new(&directive)
        .map_err(|err| format!("invalid log filter {directive}: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder
            .try_init()
            .map_err(|err| format!("failed to init logging: {err}")),
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|err| format!("failed to init logging: {err}")),
    }
}
