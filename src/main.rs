//! TreeVault command-line entry point.
//!
//! Loads configuration, sets up logging, and runs one command against the
//! configured metadata backend and store roots.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use treevault_core::config::AppConfig;

mod app;
mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ── Step 1: Configuration ────────────────────────────────────
    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // ── Step 2: Logging ──────────────────────────────────────────
    init_logging(&config);
    tracing::debug!(config = %cli.config, "Configuration loaded");

    // ── Step 3: Command ──────────────────────────────────────────
    if let Err(e) = cli.execute(&config).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured
/// level. Output goes to stderr so command output stays parseable.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
