//! mcwriter - Main entry point

use anyhow::Context;
use clap::Parser;
use mcw_cli::{Cli, Commands, Config};
use mcw_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    let config = match Config::load(&cli.data_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        },
    };

    // Initialize logging (the CLI works without it)
    let _guard = match log_config(cli.verbose || config.debug).and_then(|c| init_logging(&c)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    let result = match cli.command {
        Commands::Run { mode } => mcw_cli::commands::run::run(&config.with_mode(mode)).await,
        Commands::Validate => mcw_cli::commands::validate::run(&config),
    };

    if let Err(e) = result {
        error!(error = %e, user_error = e.is_user_error(), "Command failed");
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// Console logging at info, or debug when requested; environment variables take precedence
fn log_config(debug: bool) -> anyhow::Result<LogConfig> {
    let level = if debug { LogLevel::Debug } else { LogLevel::Info };
    LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .build()
        .merge_env()
        .context("Invalid MCW_LOG_* environment variable")
}
