// Lantern - FHIR Endpoint Capability Collection Pipeline
// Copyright (c) 2025 Lantern Contributors
// Licensed under the MIT License

use clap::Parser;
use lantern::cli::{install_signal_handler, Cli};
use lantern::config::{load_config, LoggingConfig};
use lantern::logging::init_logging;
use std::process;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // Optional; a missing .env is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let service = cli.command.service_name();

    // Logging comes up before the command validates the config, so a broken
    // file falls back to the console
    let (config_level, logging_config) = match load_config(&cli.config) {
        Ok(config) => (Some(config.application.log_level), config.logging),
        Err(_) => (None, LoggingConfig::console_only()),
    };
    let log_level = cli
        .log_level
        .clone()
        .or(config_level)
        .unwrap_or_else(|| "info".to_string());

    let guard = match init_logging(&log_level, service, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), service, "Lantern starting");

    let shutdown = CancellationToken::new();
    install_signal_handler(shutdown.clone());

    let exit_code = match cli.command.execute(&cli.config, shutdown).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e:#}");
            5
        }
    };

    // process::exit skips destructors; flush file logs first
    drop(guard);
    process::exit(exit_code);
}
