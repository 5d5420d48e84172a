use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_HISTORICAL_DAYS: u16 = 30;
const DEFAULT_FETCH_CONCURRENCY: usize = 6;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SUPPLIER_PREFIX: &str = "CNB-";
const DEFAULT_TIMEZONE: &str = "America/Edmonton";
const DEFAULT_OUTPUT_DIR: &str = "output";

/// Point-of-sale reporting API configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PosConfig {
    /// OAuth token endpoint
    pub auth_url: String,

    /// Base URL of the report execution service
    pub report_base_url: String,

    /// Company identifier embedded in report requests
    pub company_id: u64,

    /// Report ID for the daily inventory-on-hand snapshot
    pub ioh_report_id: String,

    /// Report ID for the windowed sales query
    pub sales_report_id: String,

    /// Entity (location) IDs passed to every report
    pub entities: Vec<u64>,

    /// Classification IDs passed to every report
    pub classifications: Vec<u64>,

    /// Time zone string sent with report requests
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Account username or email (environment only in practice)
    #[validate(length(min = 1))]
    pub username: String,

    /// Account password (environment only in practice)
    #[validate(length(min = 1))]
    pub password: String,

    /// API client key (environment only in practice)
    #[validate(length(min = 1))]
    pub client_key: String,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// POS reporting API settings
    #[validate]
    pub pos: PosConfig,

    /// Trailing window of daily snapshots to pull (1-90)
    #[serde(default = "default_historical_days")]
    #[validate(range(min = 1, max = 90))]
    pub historical_days: u16,

    /// Whether the current day is excluded from the window
    #[serde(default)]
    pub exclude_today: bool,

    /// Prefix identifying vendor codes inside the supplier SKU field
    #[serde(default = "default_supplier_prefix")]
    pub supplier_code_prefix: String,

    /// Parallel per-day fetch workers (1-10)
    #[serde(default = "default_fetch_concurrency")]
    #[validate(range(min = 1, max = 10))]
    pub fetch_concurrency: usize,

    /// Path to the vendor order-form spreadsheet, if one is supplied
    #[serde(default)]
    pub catalogue_path: Option<String>,

    /// Directory where the generated workbook is written
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_historical_days() -> u16 {
    DEFAULT_HISTORICAL_DAYS
}

fn default_fetch_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_supplier_prefix() -> String {
    DEFAULT_SUPPLIER_PREFIX.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // NOTE: credentials have no defaults - they MUST be provided via
    // environment variables or a config file kept out of version control.
    let config = Config::builder()
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("pos.username").is_err() {
        error!("POS credentials are not configured. Set APP__POS__USERNAME, APP__POS__PASSWORD and APP__POS__CLIENT_KEY.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "pos.username is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("retail_ordergen={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}
