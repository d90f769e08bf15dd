//! Validate config command implementation

use crate::config::load_config;
use crate::config::schema::DatabaseTarget;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Loads and validates the configuration, then prints a summary
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!(
            "  Broker: {}@{}:{} (prefetch {})",
            config.broker.username, config.broker.host, config.broker.port, config.broker.prefetch_count
        );
        println!("  Queues:");
        println!("    capability statements: {}", config.queues.capability_statements);
        println!("    capability requests:   {}", config.queues.capability_requests);
        println!("    versions requests:     {}", config.queues.versions_requests);
        println!("    versions responses:    {}", config.queues.versions_responses);
        println!(
            "  Querier: {} workers, {}s per job, {}ms between requests",
            config.querier.num_workers,
            config.querier.job_duration_seconds,
            config.querier.request_delay_ms
        );
        println!("  Ack Policy: {:?}", config.receiver.ack_policy);

        match config.database_target {
            DatabaseTarget::PostgreSQL => {
                if let Some(ref pg_config) = config.postgresql {
                    use secrecy::ExposeSecret;
                    println!("  Database Target: PostgreSQL");
                    println!(
                        "  PostgreSQL Connection: {}",
                        pg_config.connection_string.expose_secret().masked()
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                }
            }
            DatabaseTarget::Memory => println!("  Database Target: in-memory"),
        }

        match &config.sender.endpoints_file {
            Some(path) => println!("  Endpoint List: {path}"),
            None => println!("  Endpoint List: (not set)"),
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let code = ValidateArgs {}
            .execute("/nonexistent/lantern.toml")
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database_target = \"memory\"\n[broker]\npassword = \"guest\""
        )
        .unwrap();
        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
