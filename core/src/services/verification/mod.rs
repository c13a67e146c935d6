//! Email verification sessions
//!
//! This module provides the verification workflow for institutional addresses:
//! - One session per identity, superseded when a new one starts
//! - Token generation from the OS CSPRNG with constant-time comparison
//! - Mutual exclusion of identities and emails across concurrent sessions
//! - Token validity timers and post-exhaustion cooldowns

mod cooldown;
mod pending_registry;
mod session;
mod supervisor;
mod token_generator;
mod traits;
mod types;

#[cfg(test)]
mod tests;

pub use cooldown::{CooldownInfo, CooldownRegistry};
pub use pending_registry::PendingRegistry;
pub use session::VerificationSession;
pub use supervisor::{SessionHandle, SessionSupervisor};
pub use token_generator::{tokens_match, TokenGenerator};
pub use traits::{DeliveryError, DeliveryReceipt, NoopPresenter, NotificationSender, Presenter};
pub use types::{EmailOutcome, TokenOutcome};
