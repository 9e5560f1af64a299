use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";

const RAZORPAY_API_URL: &str = "https://api.razorpay.com/v1";
const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT signing secret
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[serde(default = "default_jwt_expiration_secs")]
    pub jwt_expiration_secs: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
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

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool sizing
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Razorpay credentials (absent or placeholder ⇒ provider disabled)
    #[serde(default)]
    pub razorpay_key_id: Option<String>,
    #[serde(default)]
    pub razorpay_key_secret: Option<String>,

    /// Stripe secret key (absent or placeholder ⇒ provider disabled)
    #[serde(default)]
    pub stripe_secret_key: Option<String>,

    /// Provider API base URLs (overridable for test stubs)
    #[serde(default = "default_razorpay_api_url")]
    pub razorpay_api_url: String,
    #[serde(default = "default_stripe_api_url")]
    pub stripe_api_url: String,

    /// Bounded timeout for provider calls (seconds)
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
}

impl AppConfig {
    /// Creates a configuration programmatically (used by tests).
    pub fn new(database_url: String, jwt_secret: String, host: String, port: u16) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration_secs: default_jwt_expiration_secs(),
            host,
            port,
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            event_channel_capacity: default_event_channel_capacity(),
            razorpay_key_id: None,
            razorpay_key_secret: None,
            stripe_secret_key: None,
            razorpay_api_url: default_razorpay_api_url(),
            stripe_api_url: default_stripe_api_url(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        !self.is_production() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// A credential counts as configured only when present, non-blank, and not an
/// obvious placeholder left over from an `.env` template.
pub fn credential_configured(value: &Option<String>) -> bool {
    match value {
        Some(v) => {
            let trimmed = v.trim();
            !trimmed.is_empty() && !trimmed.to_ascii_lowercase().contains("placeholder")
        }
        None => false,
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads application configuration.
///
/// Layers sources in this order:
/// 1. Built-in defaults
/// 2. `config/default.toml`
/// 3. `config/{env}.toml`
/// 4. Environment variables (`APP__*`)
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

    // jwt_secret deliberately has no default: it must come from a config
    // file or APP__JWT_SECRET.
    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("environment", DEFAULT_ENV)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to a secure random string.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET.".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes the tracing subscriber. Falls back silently when a global
/// subscriber is already installed (tests).
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

fn default_jwt_expiration_secs() -> u64 {
    3600
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    16
}

fn default_db_min_connections() -> u32 {
    2
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_razorpay_api_url() -> String {
    RAZORPAY_API_URL.to_string()
}

fn default_stripe_api_url() -> String {
    STRIPE_API_URL.to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    10
}
