//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{AckPolicy, DatabaseTarget, LanternConfig};
use crate::config::secret_string;
use crate::domain::errors::LanternError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into LanternConfig
/// 4. Applies environment variable overrides (LANTERN_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use lantern::config::loader::load_config;
///
/// let config = load_config("lantern.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<LanternConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(LanternError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        LanternError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Parses configuration from TOML text, applying the same substitution,
/// overrides and validation as [`load_config`]
pub fn load_config_from_str(contents: &str) -> Result<LanternConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: LanternConfig = toml::from_str(&contents)
        .map_err(|e| LanternError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        LanternError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| LanternError::Configuration(format!("invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        // Comments are copied through untouched
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(LanternError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Reads `name` and parses it, ignoring values that do not parse
fn env_parsed<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.parse().ok())
}

/// Applies environment variable overrides using LANTERN_* prefix
///
/// Environment variables follow the pattern: LANTERN_<SECTION>_<KEY>
/// For example: LANTERN_BROKER_HOST, LANTERN_QUERIER_NUM_WORKERS
fn apply_env_overrides(config: &mut LanternConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("LANTERN_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Broker overrides
    if let Ok(val) = std::env::var("LANTERN_BROKER_HOST") {
        config.broker.host = val;
    }
    if let Some(port) = env_parsed("LANTERN_BROKER_PORT") {
        config.broker.port = port;
    }
    if let Ok(val) = std::env::var("LANTERN_BROKER_USERNAME") {
        config.broker.username = val;
    }
    if let Ok(val) = std::env::var("LANTERN_BROKER_PASSWORD") {
        config.broker.password = secret_string(val);
    }
    if let Some(prefetch) = env_parsed("LANTERN_BROKER_PREFETCH_COUNT") {
        config.broker.prefetch_count = prefetch;
    }

    // Queue overrides
    if let Ok(val) = std::env::var("LANTERN_QUEUES_CAPABILITY_STATEMENTS") {
        config.queues.capability_statements = val;
    }
    if let Ok(val) = std::env::var("LANTERN_QUEUES_CAPABILITY_REQUESTS") {
        config.queues.capability_requests = val;
    }
    if let Ok(val) = std::env::var("LANTERN_QUEUES_VERSIONS_REQUESTS") {
        config.queues.versions_requests = val;
    }
    if let Ok(val) = std::env::var("LANTERN_QUEUES_VERSIONS_RESPONSES") {
        config.queues.versions_responses = val;
    }

    // Querier overrides
    if let Some(workers) = env_parsed("LANTERN_QUERIER_NUM_WORKERS") {
        config.querier.num_workers = workers;
    }
    if let Some(secs) = env_parsed("LANTERN_QUERIER_JOB_DURATION_SECONDS") {
        config.querier.job_duration_seconds = secs;
    }
    if let Some(secs) = env_parsed("LANTERN_QUERIER_REQUEST_TIMEOUT_SECONDS") {
        config.querier.request_timeout_seconds = secs;
    }
    if let Some(ms) = env_parsed("LANTERN_QUERIER_REQUEST_DELAY_MS") {
        config.querier.request_delay_ms = ms;
    }
    if let Ok(val) = std::env::var("LANTERN_QUERIER_USER_AGENT") {
        config.querier.user_agent = val;
    }

    // Receiver overrides
    if let Ok(val) = std::env::var("LANTERN_RECEIVER_ACK_POLICY") {
        config.receiver.ack_policy = match val.as_str() {
            "ack_always" => AckPolicy::AckAlways,
            "nack_requeue_on_error" => AckPolicy::NackRequeueOnError,
            other => {
                return Err(LanternError::Configuration(format!(
                    "Invalid LANTERN_RECEIVER_ACK_POLICY '{other}'"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("LANTERN_RECEIVER_PRODUCT_MAPPING_FILE") {
        config.receiver.product_mapping_file = Some(val);
    }

    // Sender overrides
    if let Ok(val) = std::env::var("LANTERN_SENDER_ENDPOINTS_FILE") {
        config.sender.endpoints_file = Some(val);
    }
    if let Some(minutes) = env_parsed("LANTERN_SENDER_INTERVAL_MINUTES") {
        config.sender.interval_minutes = minutes;
    }
    if let Some(ms) = env_parsed("LANTERN_SENDER_ENQUEUE_DELAY_MS") {
        config.sender.enqueue_delay_ms = ms;
    }

    // Database target override
    if let Ok(val) = std::env::var("LANTERN_DATABASE_TARGET") {
        config.database_target = match val.as_str() {
            "postgresql" => DatabaseTarget::PostgreSQL,
            "memory" => DatabaseTarget::Memory,
            other => {
                return Err(LanternError::Configuration(format!(
                    "Invalid LANTERN_DATABASE_TARGET '{other}'. Must be 'postgresql' or 'memory'"
                )))
            }
        };
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg_config) = config.postgresql {
        if let Ok(val) = std::env::var("LANTERN_POSTGRESQL_CONNECTION_STRING") {
            pg_config.connection_string = secret_string(val);
        }
        if let Some(max) = env_parsed("LANTERN_POSTGRESQL_MAX_CONNECTIONS") {
            pg_config.max_connections = max;
        }
        if let Ok(val) = std::env::var("LANTERN_POSTGRESQL_SSL_MODE") {
            pg_config.ssl_mode = val;
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("LANTERN_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("LANTERN_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("LANTERN_LOGGING_JSON_CONSOLE") {
        config.logging.json_console = val.parse().unwrap_or(false);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
database_target = "memory"

[broker]
host = "rabbitmq"
password = "capabilityquerier"
"#;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("LANTERN_TEST_SUB_VAR", "test_value");
        let input = "password = \"${LANTERN_TEST_SUB_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("LANTERN_TEST_SUB_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("LANTERN_TEST_MISSING_VAR");
        let input = "password = \"${LANTERN_TEST_MISSING_VAR}\"";
        let result = substitute_env_vars(input);
        assert!(result.is_err());
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# password = \"${LANTERN_TEST_NEVER_SET}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.broker.host, "rabbitmq");
        assert_eq!(config.broker.password.expose_secret(), "capabilityquerier");
        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.queues.capability_statements, "capability-statements");
        assert_eq!(config.database_target, DatabaseTarget::Memory);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let toml_content = r#"
database_target = "memory"

[broker]
password = "x"

[querier]
num_workers = 0
"#;
        let err = load_config_from_str(toml_content).unwrap_err();
        assert!(err.to_string().contains("num_workers"));
    }
}
