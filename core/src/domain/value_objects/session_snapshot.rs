//! Read-only view of a verification session handed to presenters.

use chrono::{DateTime, Utc};
use cv_shared::email::EmailFormatError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{FailureClass, Identity, SessionState};

/// Where an email conflict was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSource {
    /// The address is already bound to a verified member
    Directory,
    /// The address is claimed by another in-flight session
    Pending,
}

/// Context for the most recent transition, shown alongside the state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The submitted address is malformed
    InvalidEmail(EmailFormatError),
    /// The submitted address is well formed but outside the institutional domains
    DomainNotAllowed { domain: String },
    /// A wrong token was entered
    WrongToken { remaining_attempts: u32 },
    /// The address is already taken
    EmailTaken { source: ConflictSource },
    /// The mail transport rejected the address
    DeliveryFailed { reason: String },
    /// The directory could not be read or written
    DirectoryFailed { reason: String },
    /// Attempts were exhausted and the identity is locked out
    CooldownStarted { seconds: u64 },
}

impl SessionNotice {
    /// Stable code for presentation layers
    pub fn code(&self) -> &'static str {
        match self {
            SessionNotice::InvalidEmail(err) => err.code(),
            SessionNotice::DomainNotAllowed { .. } => "EMAIL_DOMAIN_NOT_ALLOWED",
            SessionNotice::WrongToken { .. } => "TOKEN_MISMATCH",
            SessionNotice::EmailTaken { .. } => "EMAIL_TAKEN",
            SessionNotice::DeliveryFailed { .. } => "DELIVERY_FAILED",
            SessionNotice::DirectoryFailed { .. } => "DIRECTORY_FAILED",
            SessionNotice::CooldownStarted { .. } => "COOLDOWN_STARTED",
        }
    }
}

/// Snapshot of a session at one transition
///
/// Never carries the token itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub identity: Identity,
    pub state: SessionState,
    /// Normalized address once one has passed format checks
    pub email: Option<String>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub notice: Option<SessionNotice>,
}

impl SessionSnapshot {
    /// Token guesses left before the session is exhausted
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt_count)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn failure_class(&self) -> Option<FailureClass> {
        self.state.failure_class()
    }
}
