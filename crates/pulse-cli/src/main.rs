use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pulse_cli::commands::heartbeat::{self, CONFIG_ERROR};
use pulse_cli::{Cli, Config};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support. Logs go to stderr so a
    // fully successful run keeps stdout empty.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut config = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("failed to load configuration: {err}");
            return ExitCode::from(CONFIG_ERROR);
        }
    };
    if let Some(key) = &cli.key {
        config.api_key = Some(key.clone());
    }
    tracing::debug!(?config, "loaded configuration");

    ExitCode::from(heartbeat::run(&cli, &config))
}
