//! Init command implementation
//!
//! Writes a starter `lantern.toml`.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "lantern.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Set LANTERN_QUEUE_PASSWORD and LANTERN_DATABASE_URL (or use a .env file)");
                println!("  3. Validate configuration: lantern validate-config");
                println!("  4. Start the services: lantern receive, lantern query, lantern send");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# Lantern Configuration File
# FHIR endpoint capability collection

database_target = "postgresql"  # postgresql | memory

[broker]
host = "localhost"
port = 5672
username = "capabilityquerier"
password = "${LANTERN_QUEUE_PASSWORD}"

[querier]
num_workers = 10

[sender]
endpoints_file = "resources/endpoints.json"

[postgresql]
connection_string = "${LANTERN_DATABASE_URL}"

[logging]
local_enabled = false
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# Lantern Configuration File
# FHIR endpoint capability collection
#
# One file configures all three services:
#   lantern send     - publishes the endpoint list for $versions requests
#   lantern query    - queries endpoints and publishes what it finds
#   lantern receive  - stores the results
#
# ${VAR} placeholders are read from the environment (or a .env file).
# Any key can also be overridden with LANTERN_<SECTION>_<KEY>.

# Endpoint store: postgresql | memory
database_target = "postgresql"

[application]
# Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
log_level = "info"

# ============================================================================
# Message Broker (RabbitMQ)
# ============================================================================
[broker]
host = "localhost"
port = 5672
username = "capabilityquerier"
password = "${LANTERN_QUEUE_PASSWORD}"

# Unacknowledged deliveries per consumer
prefetch_count = 1

[queues]
capability_statements = "capability-statements"
capability_requests = "endpoints-to-capability"
versions_requests = "endpoints-to-versions"
versions_responses = "versions-responses"

# ============================================================================
# Capability Querier
# ============================================================================
[querier]
# Concurrent query jobs
num_workers = 10

# Time budget for one endpoint, fetches and publish included
job_duration_seconds = 30

# Per-request HTTP timeout
request_timeout_seconds = 35

# Pause before each request to an endpoint
request_delay_ms = 500

# user_agent = "LANTERN/0.1.0"

# ============================================================================
# Capability Receiver
# ============================================================================
[receiver]
# What happens to a message whose handler failed:
#   ack_always            - drop it (failures are logged)
#   nack_requeue_on_error - return it to the queue for redelivery
ack_policy = "ack_always"

# JSON list of {"name", "version", "productId"} used for product matching
# product_mapping_file = "resources/product_mapping.json"

# ============================================================================
# Endpoint Sender
# ============================================================================
[sender]
# JSON array of URLs, or of objects with a "URL" field
endpoints_file = "resources/endpoints.json"

# Minutes between rounds; 0 sends a single round
interval_minutes = 0

# Pause between published URLs
enqueue_delay_ms = 500

# ============================================================================
# Endpoint Store (PostgreSQL)
# ============================================================================
[postgresql]
# postgresql://[user[:password]@][host][:port][/dbname]
connection_string = "${LANTERN_DATABASE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60

# disable | allow | prefer | require | verify-ca | verify-full
ssl_mode = "disable"

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files in addition to the console
local_enabled = false
local_path = "/var/log/lantern"

# daily | hourly
local_rotation = "daily"

# JSON on the console instead of the human-readable format
json_console = false
"#
        .to_string()
    }
}
