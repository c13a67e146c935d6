//! # Campus Verify Core
//!
//! Verification of institutional email addresses for chat-platform identities.
//! This crate contains the domain entities, the session state machine and its
//! supervisor, the directory interface, and error types. Transports, storage
//! backends and wiring live in `cv_infra`.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::*;
pub use errors::*;
pub use repositories::*;
pub use services::*;
