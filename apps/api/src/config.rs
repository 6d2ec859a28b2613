//! API configuration module.
//!
//! Layered with the `config` crate:
//!
//! ```text
//!   built-in defaults
//!     ▼ overridden by
//!   stockline.toml (optional, working directory)
//!     ▼ overridden by
//!   environment variables (PORT, DATABASE_URL, JWT_SECRET, ...)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Development signing secret. Refused when `app_env` is `production`.
pub const DEV_JWT_SECRET: &str = "stockline-dev-secret-change-in-production";

/// API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// `development` or `production`
    pub app_env: String,

    /// Interface to bind
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file, or `:memory:`
    pub database_url: String,

    /// Maximum pooled connections
    pub db_max_connections: u32,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// JWT access token lifetime in seconds
    pub jwt_access_lifetime_secs: i64,

    /// JWT refresh token lifetime in seconds
    pub jwt_refresh_lifetime_secs: i64,

    /// Allowed CORS origin
    pub frontend_url: String,

    /// Root directory for avatars and generated reports
    pub upload_dir: PathBuf,

    /// Accounts allowed to administer every tenant. Comma separated in
    /// `PLATFORM_ADMINS`.
    #[serde(default)]
    pub platform_admins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            app_env: "development".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "./stockline.db".to_string(),
            db_max_connections: 5,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_access_lifetime_secs: 3600,
            jwt_refresh_lifetime_secs: 604_800,
            frontend_url: "http://localhost:4200".to_string(),
            upload_dir: PathBuf::from("./uploads"),
            platform_admins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from defaults, `stockline.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let config: ApiConfig = config::Config::builder()
            .set_default("app_env", defaults.app_env)?
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("database_url", defaults.database_url)?
            .set_default("db_max_connections", i64::from(defaults.db_max_connections))?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_access_lifetime_secs", defaults.jwt_access_lifetime_secs)?
            .set_default("jwt_refresh_lifetime_secs", defaults.jwt_refresh_lifetime_secs)?
            .set_default("frontend_url", defaults.frontend_url)?
            .set_default("upload_dir", defaults.upload_dir.to_string_lossy().into_owned())?
            .add_source(config::File::with_name("stockline").required(false))
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("platform_admins"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that are unsafe or unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() && (self.jwt_secret.is_empty() || self.jwt_secret == DEV_JWT_SECRET) {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }

        if self.jwt_access_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_ACCESS_LIFETIME_SECS".to_string()));
        }

        if self.jwt_refresh_lifetime_secs <= self.jwt_access_lifetime_secs {
            return Err(ConfigError::InvalidValue("JWT_REFRESH_LIFETIME_SECS".to_string()));
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(())
    }

    /// Case-insensitive match against `platform_admins`.
    pub fn is_platform_admin(&self, email: &str) -> bool {
        self.platform_admins
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email))
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("HOST".to_string()))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
