use arena_application::config::{Config, LogFormat};
use arena_worker::error::WorkerError;
use arena_worker::{
    execute, failure_output, load_config, logging, resolve_config_path, WorkerArgs, WorkerOutput,
};
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "arena-worker")]
#[command(
    about = "Portfolio analytics, trading guardrails and agent evaluation. Prints one JSON envelope on stdout.",
    version
)]
struct Cli {
    /// Config file path (TOML). If omitted, uses env ARENA_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log format on stderr: text | json. Overrides [logging].format.
    #[arg(long, value_parser = LogFormat::parse)]
    log_format: Option<LogFormat>,

    /// Payload source: inline JSON, `-` for stdin, a file path or an http(s) URL.
    #[arg(long)]
    input: Option<String>,

    /// Command to run (`arena-worker commands` lists them).
    command: String,

    /// Payload, accepting anything --input accepts.
    json_args: Option<String>,
}

fn emit(output: &WorkerOutput) -> ! {
    println!("{}", output.render());
    std::process::exit(output.exit_code);
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                let message = err.render().to_string();
                let first_line = message.lines().next().unwrap_or("invalid arguments");
                emit(&failure_output(
                    None,
                    &WorkerError::Usage(first_line.trim_start_matches("error: ").to_string()),
                ));
            }
        },
    };

    let config = load_config(resolve_config_path(cli.config.clone()).as_deref());
    let fallback = Config::default();
    let log_source = config.as_ref().unwrap_or(&fallback);
    let format = cli.log_format.unwrap_or_else(|| log_source.log_format());
    if let Err(err) = logging::init(log_source.log_level(), format) {
        emit(&failure_output(Some(&cli.command), &WorkerError::Config(err)));
    }

    let config = match config {
        Ok(config) => config,
        Err(err) => emit(&failure_output(Some(&cli.command), &err)),
    };
    tracing::debug!(command = %cli.command, "worker starting");

    let args = WorkerArgs {
        command: cli.command,
        json_args: cli.json_args,
        input: cli.input,
    };
    emit(&execute(&args, &config));
}
