//! Configuration module with business-specific sub-modules
//!
//! This module organizes configuration into logical areas:
//! - `verification` - Verification session policy (domains, token, attempts, cooldown)
//! - `database` - Directory database connection and pool configuration
//! - `environment` - Environment detection and logging configuration

pub mod database;
pub mod environment;
pub mod verification;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use database::DatabaseConfig;
pub use environment::{Environment, LogFormat, LoggingConfig};
pub use verification::VerificationConfig;

/// Configuration errors raised while loading or validating settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration constraint violated: {message}")]
    Constraint { message: String },
}

/// Read `key` from the environment, falling back to `default` when unset
///
/// A value that is present but does not parse is an error, never a silent default.
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    parse_or(key, std::env::var(key).ok(), default)
}

/// Parse a raw setting for `key`, falling back to `default` when absent
pub fn parse_or<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// Complete application configuration combining all sub-configurations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Environment configuration
    pub environment: Environment,

    /// Verification session policy
    pub verification: VerificationConfig,

    /// Directory database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let env = Environment::default();
        Self {
            environment: env,
            verification: VerificationConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::for_environment(env),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Variables that are missing fall back to defaults; variables that are
    /// present but malformed are reported as errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();
        let verification = VerificationConfig::from_env()?;
        verification.validate()?;

        let mut logging = LoggingConfig::for_environment(environment);
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            logging.level = level;
        }

        Ok(Self {
            environment,
            verification,
            database: DatabaseConfig::from_env(),
            logging,
        })
    }
}
