//! Shared utilities and common types for Campus Verify
//!
//! This crate provides functionality used across all workspace members:
//! - Configuration types (verification policy, logging, database)
//! - Email address parsing and masking

pub mod config;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{
    AppConfig, ConfigError, DatabaseConfig, Environment, LogFormat, LoggingConfig,
    VerificationConfig,
};
pub use utils::email;
