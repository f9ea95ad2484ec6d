use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAYAPP_API_URL: &str = "https://api.payapp.kr/oapi/apiLoad.html";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 5;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default = "default_false_bool")]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials
    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Public base URL of this service, used for PayApp return/feedback URLs
    /// (e.g. "https://cert.korhrd.co.kr"). No trailing slash.
    pub base_url: String,

    /// PayApp REST API endpoint
    #[serde(default = "default_payapp_api_url")]
    pub payapp_api_url: String,

    /// PayApp merchant user id
    pub payapp_user_id: String,

    /// PayApp API link key (secret, required for cancel operations)
    pub payapp_link_key: String,

    /// Shop name shown on the PayApp payment page
    #[serde(default = "default_payapp_shop_name")]
    pub payapp_shop_name: String,

    /// Timeout for outbound gateway calls (seconds)
    #[serde(default = "default_gateway_timeout_secs")]
    #[validate(custom = "validate_timeout_secs")]
    pub gateway_timeout_secs: u64,

    /// Slack incoming-webhook URL for payment notifications (optional)
    #[serde(default)]
    pub slack_webhook_url: Option<String>,

    /// Timeout for the single notification attempt (seconds)
    #[serde(default = "default_notify_timeout_secs")]
    #[validate(custom = "validate_timeout_secs")]
    pub notify_timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_false_bool() -> bool {
    false
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_payapp_api_url() -> String {
    DEFAULT_PAYAPP_API_URL.to_string()
}
fn default_payapp_shop_name() -> String {
    "한평생교육".to_string()
}
fn default_gateway_timeout_secs() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}
fn default_notify_timeout_secs() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_SECS
}

fn validate_timeout_secs(value: u64) -> Result<(), ValidationError> {
    if value == 0 || value > 300 {
        let mut err = ValidationError::new("range");
        err.message = Some("timeout must be between 1 and 300 seconds".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    /// Construct a minimal configuration programmatically (used by tests).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database_url: String,
        host: String,
        port: u16,
        environment: String,
        base_url: String,
        payapp_user_id: String,
        payapp_link_key: String,
    ) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            base_url,
            payapp_api_url: default_payapp_api_url(),
            payapp_user_id,
            payapp_link_key,
            payapp_shop_name: default_payapp_shop_name(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            slack_webhook_url: None,
            notify_timeout_secs: default_notify_timeout_secs(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("test")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Cross-field constraints that validator's derive cannot express.
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.is_development()
            && self.cors_allowed_origins.is_none()
            && !self.cors_allow_any_origin
        {
            let mut err = ValidationError::new("cors");
            err.message = Some(
                "set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true outside development"
                    .into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.base_url.ends_with('/') {
            let mut err = ValidationError::new("base_url");
            err.message = Some("base_url must not have a trailing slash".into());
            errors.add("base_url", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("certpay_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
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
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://certpay.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("base_url", "http://localhost:8080")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // NOTE: the PayApp credentials have no defaults - they MUST come from the
    // config files or environment. Fail early with a clear message instead of
    // letting the first cancel call 401.
    for key in ["payapp_user_id", "payapp_link_key"] {
        if config.get_string(key).is_err() {
            error!(
                "PayApp credential '{}' is not configured. Set APP__{} in the environment.",
                key,
                key.to_uppercase()
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(format!(
                "{} is required but not configured",
                key
            ))));
        }
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
