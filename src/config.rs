use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 8;
const DEFAULT_DB_IDLE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 2;
const DEFAULT_DOCUMENT_TIMEOUT_SECS: u64 = 2000;
const DEFAULT_RECOMPUTE_QUEUE_DEPTH: usize = 64;

/// Tuning for the ledger itself: operation deadlines and the recompute
/// queue.
///
/// Point lookups and existence checks are expected to return within
/// seconds; document-level history creation fans out across line items and
/// bundle components and gets a deadline orders of magnitude longer.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Deadline for point lookups and existence checks.
    #[serde(default = "default_lookup_timeout_secs")]
    #[validate(range(min = 1))]
    pub lookup_timeout_secs: u64,

    /// Deadline for document-level history creation and recompute passes.
    #[serde(default = "default_document_timeout_secs")]
    #[validate(range(min = 1))]
    pub document_timeout_secs: u64,

    /// Pending recompute requests buffered per (store, product) stream.
    #[serde(default = "default_recompute_queue_depth")]
    #[validate(range(min = 1))]
    pub recompute_queue_depth: usize,
}

impl LedgerConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_secs: default_lookup_timeout_secs(),
            document_timeout_secs: default_document_timeout_secs(),
            recompute_queue_depth: default_recompute_queue_depth(),
        }
    }
}

/// Application configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Maximum number of database connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    /// Minimum number of database connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Database connect timeout in seconds
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Database acquire timeout in seconds
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Database idle timeout in seconds
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Ledger tuning
    #[serde(default)]
    #[validate]
    pub ledger: LedgerConfig,
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_db_min_connections() -> u32 {
    DEFAULT_DB_MIN_CONNECTIONS
}

fn default_db_connect_timeout_secs() -> u64 {
    DEFAULT_DB_CONNECT_TIMEOUT_SECS
}

fn default_db_acquire_timeout_secs() -> u64 {
    DEFAULT_DB_ACQUIRE_TIMEOUT_SECS
}

fn default_db_idle_timeout_secs() -> u64 {
    DEFAULT_DB_IDLE_TIMEOUT_SECS
}

fn default_lookup_timeout_secs() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_SECS
}

fn default_document_timeout_secs() -> u64 {
    DEFAULT_DOCUMENT_TIMEOUT_SECS
}

fn default_recompute_queue_depth() -> usize {
    DEFAULT_RECOMPUTE_QUEUE_DEPTH
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Loads configuration from `config/default`, an environment-specific
/// overlay, and `APP__`-prefixed environment variables, in that order.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://stock_ledger.db?mode=rwc")?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        e
    })?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_defaults_keep_lookup_deadline_short() {
        let ledger = LedgerConfig::default();
        assert!(ledger.lookup_timeout() < Duration::from_secs(10));
        assert!(ledger.document_timeout() >= ledger.lookup_timeout() * 100);
        assert!(ledger.recompute_queue_depth >= 1);
    }

    #[test]
    fn ledger_config_rejects_zero_queue_depth() {
        let ledger = LedgerConfig {
            recompute_queue_depth: 0,
            ..LedgerConfig::default()
        };
        assert!(ledger.validate().is_err());
    }
}
