//! Configuration management for customer-sync
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Source API (API1) configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Destination API (API2) configuration
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Sync run configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from the deployment environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(endpoint) = std::env::var("CUSTOMER_API_ENDPOINT") {
            config.source.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("CUSTOMER_API_KEY") {
            config.source.api_key = key;
        }

        if let Ok(endpoint) = std::env::var("CLIENT_API_ENDPOINT") {
            config.destination.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("CLIENT_API_KEY") {
            config.destination.api_key = key;
        }

        if let Ok(limit) = std::env::var("MAX_CONCURRENT_REQUESTS") {
            config.sync.max_concurrent_requests = limit.trim().parse().map_err(|_| {
                ConfigError::Parse(format!("Invalid MAX_CONCURRENT_REQUESTS: {}", limit))
            })?;
        }
        if let Ok(path) = std::env::var("CUSTOMER_SYNC_WATERMARK_PATH") {
            config.sync.watermark_path = path;
        }
        if let Ok(secs) = std::env::var("CUSTOMER_SYNC_RUN_TIMEOUT_SECS") {
            config.sync.run_timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Parse(format!("Invalid CUSTOMER_SYNC_RUN_TIMEOUT_SECS: {}", secs))
            })?;
        }

        if let Ok(level) = std::env::var("CUSTOMER_SYNC_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("CUSTOMER_SYNC_LOG_FORMAT") {
            config.logging.format = format;
        }

        if let Ok(enabled) = std::env::var("CUSTOMER_SYNC_OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Ok(endpoint) = std::env::var("CUSTOMER_SYNC_OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }

        Ok(config)
    }

    /// Check that the values required for a sync run are present and sane
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingRequired("source.endpoint".to_string()));
        }
        if self.destination.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "destination.endpoint".to_string(),
            ));
        }
        if self.sync.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue(
                "sync.max_concurrent_requests must be positive".to_string(),
            ));
        }
        if self.source.page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "source.page_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Source API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Customer list endpoint
    #[serde(default)]
    pub endpoint: String,

    /// Value sent verbatim in the Authorization header
    #[serde(default)]
    pub api_key: String,

    /// Number of records per page
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            page_size: default_page_size(),
            timeout_secs: default_request_timeout(),
        }
    }
}

fn default_page_size() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

/// Destination API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationConfig {
    /// Customer collection endpoint
    #[serde(default)]
    pub endpoint: String,

    /// Value sent verbatim in the Authorization header
    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Rate-limit retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for rate-limited destination calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound for a single backoff in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Upper bound for the sum of all backoffs of one operation in seconds
    #[serde(default = "default_max_total_wait")]
    pub max_total_wait_secs: u64,

    /// Hint used when a 429 carries no usable Retry-After header
    #[serde(default = "default_retry_after")]
    pub default_retry_after_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_backoff_secs: default_max_backoff(),
            max_total_wait_secs: default_max_total_wait(),
            default_retry_after_secs: default_retry_after(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_backoff() -> u64 {
    300
}

fn default_max_total_wait() -> u64 {
    900
}

fn default_retry_after() -> u64 {
    1
}

/// Sync run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Group size: records reconciled concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Path of the watermark file
    #[serde(default = "default_watermark_path")]
    pub watermark_path: String,

    /// Deadline for a whole run in seconds (0 = none)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            watermark_path: default_watermark_path(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

fn default_max_concurrent() -> usize {
    5
}

fn default_watermark_path() -> String {
    "last_sync_date.json".to_string()
}

fn default_run_timeout() -> u64 {
    3600
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether metrics export is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name attached to exported metrics
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "customer-sync".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
