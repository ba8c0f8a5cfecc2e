use thiserror::Error;

/// Failures surfaced to the host as a `{"success": false}` envelope.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Unknown command or malformed arguments.
    #[error("{0}")]
    Usage(String),

    #[error("config error: {0}")]
    Config(String),

    /// The payload could not be fetched.
    #[error("input error: {0}")]
    Input(String),

    /// The command ran and failed.
    #[error("{0}")]
    Command(String),
}

impl WorkerError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) | Self::Input(_) | Self::Command(_) => 1,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Usage(_) => "usage",
            Self::Config(_) => "config",
            Self::Input(_) => "input",
            Self::Command(_) => "command",
        }
    }
}
