mod config;
mod signals;
mod writer;

use clap::Parser;
use config::{AppConfig, LogConfig};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use writer::StateWriter;

/// Write an incrementing counter to a file once per cadence until
/// SIGINT, SIGHUP or SIGTERM arrives.
#[derive(Parser, Debug)]
#[command(
    name = "state-writer",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// State file, truncated and rewritten every cycle
    #[arg(value_name = "FILE", allow_hyphen_values = true)]
    file: PathBuf,
}

/// Parse `argv`, accepting exactly one argument after the program name.
///
/// That argument is always the path, even when it looks like a flag or is a
/// bare `--`.
fn parse_args(mut args: Vec<OsString>) -> Option<Cli> {
    if args.len() != 2 {
        return None;
    }
    args.insert(1, OsString::from("--"));
    Cli::try_parse_from(args).ok()
}

/// Name the process was invoked as, for the usage line.
fn program_name(args: &[OsString]) -> String {
    args.first()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state-writer".to_string())
}

fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Vec<OsString> = std::env::args_os().collect();
    let cli = match parse_args(args.clone()) {
        Some(cli) => cli,
        None => {
            eprintln!("usage: {} <file>", program_name(&args));
            return ExitCode::FAILURE;
        }
    };

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log);
    tracing::debug!(?cli, ?config, "resolved settings");

    let (trigger, mut shutdown) = signals::channel();
    if let Err(e) = signals::install(trigger) {
        eprintln!("error: failed to install signal handlers: {e}");
        return ExitCode::FAILURE;
    }

    let mut writer = StateWriter::new(cli.file, config.cadence.interval(), std::io::stdout());
    let result = writer.run(&mut shutdown).await;
    match result {
        Ok(outcome) => {
            tracing::debug!(cycles = outcome.cycles, "graceful shutdown");
            eprintln!("{}", signals::shutdown_message(outcome.signal));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(counter = writer.counter(), "state writer failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
