//! Command line interface for releasekit.

mod args;
mod commands;

pub use args::{Args, Command, RuntimeConfig, TagTarget, VerbosityLevel};
pub use commands::{execute_command, EXIT_NOT_OK};

/// Exit code for errors that stopped the command before it could finish
pub const EXIT_FATAL: i32 = 2;

/// Main CLI entry point: parse arguments, set up logging, run the command
pub async fn run() -> anyhow::Result<i32> {
    let args = Args::parse_args();
    init_logging(RuntimeConfig::from(&args).verbosity);
    execute_command(args).await
}

/// Initialise `env_logger`; `RUST_LOG` overrides the verbosity flags
pub fn init_logging(verbosity: VerbosityLevel) {
    let env = env_logger::Env::default().default_filter_or(verbosity.log_filter());
    // A logger may already be installed when embedded
    let _ = env_logger::Builder::from_env(env).format_timestamp(None).try_init();
}
