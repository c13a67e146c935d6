//! # Infrastructure Layer
//!
//! This crate implements the infrastructure layer for Campus Verify. It
//! provides concrete collaborators for the verification core and wires them
//! into a ready-to-use session supervisor.
//!
//! ## Architecture
//!
//! The infrastructure layer contains:
//! - **Email**: token message template and transports (mock, HTTP relay, failover)
//! - **Database**: MySQL-backed member directory using SQLx
//! - **Telemetry**: `tracing` subscriber installation
//!
//! ## Features
//!
//! - `mysql`: Enable the MySQL directory (default)

use std::sync::Arc;

use cv_core::repositories::{Directory, InMemoryDirectory};
use cv_core::services::verification::{NotificationSender, Presenter, SessionSupervisor};

// Re-export core types for convenience
pub use cv_core::errors::*;

/// Database module - MySQL directory using SQLx
#[cfg(feature = "mysql")]
pub mod database;

/// Email module - token message and transports
pub mod email;

/// Telemetry module - tracing subscriber setup
pub mod telemetry;

/// Configuration module for infrastructure services
pub mod config {
    //! Configuration management for infrastructure services
    //!
    //! Handles:
    //! - Application settings shared with the core (verification policy, logging)
    //! - Email transport selection and credentials
    //! - Directory backend selection

    use cv_shared::config::{parse_or, AppConfig, ConfigError};
    use serde::{Deserialize, Serialize};

    use crate::email::template::DEFAULT_SUBJECT;

    pub use cv_shared::config::DatabaseConfig as InfraDatabaseConfig;

    /// Which directory implementation backs the supervisor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum DirectoryBackend {
        /// Process-local map, lost on restart
        Memory,
        /// MySQL table `verified_members`
        Mysql,
    }

    impl std::str::FromStr for DirectoryBackend {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_lowercase().as_str() {
                "memory" | "in-memory" => Ok(DirectoryBackend::Memory),
                "mysql" => Ok(DirectoryBackend::Mysql),
                _ => Err(format!("Invalid directory backend: {}", s)),
            }
        }
    }

    /// Infrastructure configuration settings
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct InfrastructureConfig {
        /// Settings shared with the core
        pub app: AppConfig,
        /// Email transport configuration
        pub email: EmailConfig,
        /// Directory backend
        pub directory: DirectoryBackend,
    }

    /// Email transport configuration
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct EmailConfig {
        /// Transport ("mock", "http", "failover")
        pub provider: String,
        /// Sender address, also shown as the contact address
        pub from_address: String,
        /// Subject of the token message
        pub subject: String,
        /// Primary relay endpoint
        pub relay_url: String,
        /// Primary relay API key
        pub api_key: String,
        /// Backup relay endpoint (failover only)
        pub backup_relay_url: String,
        /// Backup relay API key (failover only)
        pub backup_api_key: String,
        /// Maximum attempts per relay request
        pub max_retries: u32,
        /// Initial retry delay in milliseconds
        pub retry_delay_ms: u64,
        /// Timeout for relay requests in seconds
        pub request_timeout_secs: u64,
        /// Seconds before a failed primary relay is tried again
        pub failover_timeout_secs: u64,
    }

    impl Default for EmailConfig {
        fn default() -> Self {
            Self {
                provider: "mock".to_string(),
                from_address: "noreply@localhost".to_string(),
                subject: DEFAULT_SUBJECT.to_string(),
                relay_url: String::new(),
                api_key: String::new(),
                backup_relay_url: String::new(),
                backup_api_key: String::new(),
                max_retries: 3,
                retry_delay_ms: 1000,
                request_timeout_secs: 30,
                failover_timeout_secs: 30,
            }
        }
    }

    impl EmailConfig {
        /// Create from environment variables
        ///
        /// Unset variables keep their defaults; numbers that fail to parse are rejected.
        pub fn from_env() -> Result<Self, ConfigError> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Build from an arbitrary key lookup
        pub fn from_lookup(
            lookup: impl Fn(&str) -> Option<String>,
        ) -> Result<Self, ConfigError> {
            let defaults = Self::default();
            let text = |key: &str, default: String| lookup(key).unwrap_or(default);

            Ok(Self {
                provider: text("EMAIL_PROVIDER", defaults.provider),
                from_address: text("EMAIL_FROM_ADDRESS", defaults.from_address),
                subject: text("EMAIL_SUBJECT", defaults.subject),
                relay_url: text("EMAIL_RELAY_URL", defaults.relay_url),
                api_key: text("EMAIL_RELAY_API_KEY", defaults.api_key),
                backup_relay_url: text("EMAIL_BACKUP_RELAY_URL", defaults.backup_relay_url),
                backup_api_key: text("EMAIL_BACKUP_RELAY_API_KEY", defaults.backup_api_key),
                max_retries: parse_or(
                    "EMAIL_RELAY_MAX_RETRIES",
                    lookup("EMAIL_RELAY_MAX_RETRIES"),
                    defaults.max_retries,
                )?,
                retry_delay_ms: parse_or(
                    "EMAIL_RELAY_RETRY_DELAY_MS",
                    lookup("EMAIL_RELAY_RETRY_DELAY_MS"),
                    defaults.retry_delay_ms,
                )?,
                request_timeout_secs: parse_or(
                    "EMAIL_RELAY_REQUEST_TIMEOUT_SECS",
                    lookup("EMAIL_RELAY_REQUEST_TIMEOUT_SECS"),
                    defaults.request_timeout_secs,
                )?,
                failover_timeout_secs: parse_or(
                    "EMAIL_FAILOVER_TIMEOUT_SECS",
                    lookup("EMAIL_FAILOVER_TIMEOUT_SECS"),
                    defaults.failover_timeout_secs,
                )?,
            })
        }
    }

    impl Default for InfrastructureConfig {
        fn default() -> Self {
            Self {
                app: AppConfig::default(),
                email: EmailConfig::default(),
                directory: DirectoryBackend::Memory,
            }
        }
    }

}

/// Infrastructure service container
#[derive(Clone)]
pub struct InfrastructureServices {
    /// Session supervisor wired to the configured collaborators
    pub supervisor: Arc<SessionSupervisor>,
    /// Member directory backing the supervisor
    pub directory: Arc<dyn Directory>,
    /// Loaded configuration
    pub config: config::InfrastructureConfig,
}

/// Initialize infrastructure services
///
/// This function:
/// - Loads configuration from the environment (and `.env` files)
/// - Installs the tracing subscriber
/// - Connects the configured directory backend
/// - Builds the email transport and the session supervisor
pub async fn initialize(
    presenter: Arc<dyn Presenter>,
) -> Result<InfrastructureServices, InfrastructureError> {
    let config = load_config()?;

    if let Err(e) = telemetry::init_tracing(&config.app.logging) {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }

    tracing::info!(
        environment = %config.app.environment,
        email_provider = %config.email.provider,
        directory = ?config.directory,
        "Initializing infrastructure services..."
    );

    let directory = create_directory(&config).await?;

    let email_service: Arc<dyn email::EmailService> =
        Arc::from(email::create_email_service(&config.email)?);
    let template = email::TokenEmailTemplate::new(
        config.email.from_address.clone(),
        config.app.verification.token_validity(),
    )
    .with_subject(config.email.subject.clone());
    let notifier: Arc<dyn NotificationSender> =
        Arc::new(email::EmailNotifier::new(email_service, template));

    let supervisor = SessionSupervisor::new(
        Arc::clone(&directory),
        notifier,
        presenter,
        config.app.verification.clone(),
    )?;

    tracing::info!("Infrastructure services initialized successfully");

    Ok(InfrastructureServices {
        supervisor: Arc::new(supervisor),
        directory,
        config,
    })
}

/// Create the configured directory backend
pub async fn create_directory(
    config: &config::InfrastructureConfig,
) -> Result<Arc<dyn Directory>, InfrastructureError> {
    match config.directory {
        config::DirectoryBackend::Memory => {
            tracing::warn!("Using in-memory directory; verified members are lost on restart");
            Ok(Arc::new(InMemoryDirectory::new()))
        }
        #[cfg(feature = "mysql")]
        config::DirectoryBackend::Mysql => {
            let pool = database::DatabasePool::new(config.app.database.clone()).await?;
            pool.ensure_schema().await?;
            Ok(Arc::new(database::MySqlDirectory::new(pool.get_pool().clone())))
        }
        #[cfg(not(feature = "mysql"))]
        config::DirectoryBackend::Mysql => Err(InfrastructureError::Config(
            "MySQL directory requested but the `mysql` feature is disabled".to_string(),
        )),
    }
}

/// Load infrastructure configuration from environment
pub fn load_config() -> Result<config::InfrastructureConfig, InfrastructureError> {
    let environment = cv_shared::Environment::from_env();
    dotenvy::from_filename(environment.env_file()).ok();
    dotenvy::dotenv().ok(); // Load .env file if present

    let app = cv_shared::AppConfig::from_env()
        .map_err(|e| InfrastructureError::Config(e.to_string()))?;

    let directory = match std::env::var("DIRECTORY_BACKEND") {
        Ok(raw) => raw.parse().map_err(InfrastructureError::Config)?,
        Err(_) => config::DirectoryBackend::Memory,
    };

    Ok(config::InfrastructureConfig {
        app,
        email: config::EmailConfig::from_env()
            .map_err(|e| InfrastructureError::Config(e.to_string()))?,
        directory,
    })
}

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Database connection error
    #[cfg(feature = "mysql")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request error for external services
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Email could not be sent right now
    #[error("Email service error: {0}")]
    Email(String),

    /// Email transport refused the message or the address
    #[error("Email rejected: {0}")]
    EmailRejected(String),

    /// Error raised by the verification core
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// General infrastructure error
    #[error("Infrastructure error: {0}")]
    General(String),
}
