//! Domain-specific error types and error handling.

mod types;


pub use types::{RouteRejected, StartRejected};

use cv_shared::ConfigError;
use thiserror::Error;

/// Core domain errors (general purpose)
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Directory error: {message}")]
    Directory { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type DomainResult<T> = Result<T, DomainError>;
