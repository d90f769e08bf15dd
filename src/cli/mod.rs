//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

/// Lantern - FHIR endpoint capability collection
#[derive(Parser, Debug)]
#[command(name = "lantern")]
#[command(version, about, long_about = None)]
#[command(author = "Lantern Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "lantern.toml", env = "LANTERN_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "LANTERN_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capability querier
    Query(commands::query::QueryArgs),

    /// Run the capability receiver
    Receive(commands::receive::ReceiveArgs),

    /// Run the endpoint sender
    Send(commands::send::SendArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

impl Commands {
    /// Service name used in logs
    pub fn service_name(&self) -> &'static str {
        match self {
            Commands::Query(_) => "capabilityquerier",
            Commands::Receive(_) => "capabilityreceiver",
            Commands::Send(_) => "endpointsender",
            Commands::ValidateConfig(_) | Commands::Init(_) => "lantern",
        }
    }

    /// Execute the command, returning the process exit code
    pub async fn execute(&self, config_path: &str, cancel: CancellationToken) -> anyhow::Result<i32> {
        match self {
            Commands::Query(args) => args.execute(config_path, cancel).await,
            Commands::Receive(args) => args.execute(config_path, cancel).await,
            Commands::Send(args) => args.execute(config_path, cancel).await,
            Commands::ValidateConfig(args) => args.execute(config_path).await,
            Commands::Init(args) => args.execute().await,
        }
    }
}

/// Cancels `token` on SIGINT or SIGTERM
pub fn install_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down");
                }
            }
            token.cancel();
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            } else {
                tracing::info!("Received SIGINT, shutting down");
                token.cancel();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_query() {
        let cli = Cli::parse_from(["lantern", "query"]);
        assert_eq!(cli.config, "lantern.toml");
        assert!(matches!(cli.command, Commands::Query(ref a) if a.endpoints.is_none()));
    }

    #[test]
    fn test_cli_parse_query_with_endpoints() {
        let cli = Cli::parse_from(["lantern", "query", "--endpoints", "endpoints.json"]);
        assert!(matches!(cli.command, Commands::Query(ref a) if a.endpoints.as_deref() == Some("endpoints.json")));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["lantern", "--config", "custom.toml", "receive"]);
        assert_eq!(cli.config, "custom.toml");
        assert_eq!(cli.command.service_name(), "capabilityreceiver");
    }

    #[test]
    fn test_cli_parse_send_once() {
        let cli = Cli::parse_from(["lantern", "--log-level", "debug", "send", "--once"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::Send(ref a) if a.once));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["lantern", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["lantern", "init", "--force"]);
        assert!(matches!(cli.command, Commands::Init(ref a) if a.force));
    }
}
