//! Outcomes returned by session transitions

use chrono::{DateTime, Utc};
use cv_shared::email::EmailFormatError;
use std::time::Duration;

use crate::domain::entities::{FailureClass, VerifiedMember};
use crate::domain::value_objects::ConflictSource;

/// Result of submitting an email address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailOutcome {
    /// A token was issued and handed to the transport
    TokenSent {
        email: String,
        expires_at: DateTime<Utc>,
    },
    /// The address is malformed; another address may be submitted
    FormatInvalid(EmailFormatError),
    /// The address is outside the institutional domains; another may be submitted
    DomainNotAllowed { domain: String },
    /// The address is already taken; the session ended
    EmailConflict { source: ConflictSource },
    /// The transport rejected the address; the session ended
    DeliveryFailed { reason: String },
    /// The directory could not be read; the session ended
    DirectoryFailed { reason: String },
}

impl EmailOutcome {
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            EmailOutcome::TokenSent { .. } => None,
            EmailOutcome::FormatInvalid(_) | EmailOutcome::DomainNotAllowed { .. } => {
                Some(FailureClass::UserCorrectable)
            }
            EmailOutcome::EmailConflict { .. } => Some(FailureClass::UserTerminal),
            EmailOutcome::DeliveryFailed { .. } | EmailOutcome::DirectoryFailed { .. } => {
                Some(FailureClass::Infrastructure)
            }
        }
    }
}

/// Result of submitting a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    /// The binding was committed
    Verified { member: VerifiedMember },
    /// The token did not match; the session keeps waiting
    WrongToken { remaining_attempts: u32 },
    /// The last attempt was used; the identity is cooling down
    Exhausted { cooldown: Duration },
    /// The address was taken while the token was out; the session ended
    EmailConflict { source: ConflictSource },
    /// The directory could not be read or written; the session ended
    DirectoryFailed { reason: String },
}

impl TokenOutcome {
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            TokenOutcome::Verified { .. } => None,
            TokenOutcome::WrongToken { .. } => Some(FailureClass::UserCorrectable),
            TokenOutcome::Exhausted { .. } | TokenOutcome::EmailConflict { .. } => {
                Some(FailureClass::UserTerminal)
            }
            TokenOutcome::DirectoryFailed { .. } => Some(FailureClass::Infrastructure),
        }
    }
}
