//! Verification session states and their classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a verification session
///
/// ```text
/// Idle -> AwaitingEmail -> Validating -> AwaitingToken -> TokenEntered -> Verified
///              ^               |              |               |
///              +-- FormatInvalid              |               +-> EmailConflict | DirectoryFailed
///                              |              +-> TokenTimeout | TokenExhausted | DeliveryFailed
///                              +-> EmailConflict | DirectoryFailed
/// any non-terminal state -> Superseded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, identity reserved, nothing shown yet
    #[default]
    Idle,
    /// Waiting for the person to submit an email address
    AwaitingEmail,
    /// The last submitted address was malformed or outside the allowed domains
    FormatInvalid,
    /// A submitted address is being checked for availability
    Validating,
    /// A token was issued and delivery requested
    AwaitingToken,
    /// The correct token was entered; availability is re-checked before commit
    TokenEntered,
    /// Binding committed to the directory
    Verified,
    /// The token validity window elapsed
    TokenTimeout,
    /// Too many wrong tokens
    TokenExhausted,
    /// The address is already bound or claimed by another pending session
    EmailConflict,
    /// The mail transport rejected the address
    DeliveryFailed,
    /// The directory could not be read or written
    DirectoryFailed,
    /// Replaced by a newer session for the same identity
    Superseded,
}

/// How a session outcome should be treated by the surrounding system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The person can fix the input and retry within the same session
    UserCorrectable,
    /// The session ended because of the person's input; a new session is needed
    UserTerminal,
    /// The session ended because a collaborator failed; operators should be alerted
    Infrastructure,
    /// The session was replaced by a newer one; not an error
    Superseded,
}

impl SessionState {
    /// Whether no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Verified
                | SessionState::TokenTimeout
                | SessionState::TokenExhausted
                | SessionState::EmailConflict
                | SessionState::DeliveryFailed
                | SessionState::DirectoryFailed
                | SessionState::Superseded
        )
    }

    /// Whether an email submission is accepted in this state
    pub fn accepts_email(&self) -> bool {
        matches!(self, SessionState::AwaitingEmail | SessionState::FormatInvalid)
    }

    /// Whether a token submission is accepted in this state
    pub fn accepts_token(&self) -> bool {
        matches!(self, SessionState::AwaitingToken)
    }

    /// Whether a token may be held in this state
    pub fn may_hold_token(&self) -> bool {
        matches!(self, SessionState::AwaitingToken | SessionState::TokenEntered)
    }

    /// Whether the person should be offered a brand-new session
    pub fn offers_restart(&self) -> bool {
        matches!(
            self,
            SessionState::TokenTimeout
                | SessionState::DeliveryFailed
                | SessionState::DirectoryFailed
        )
    }

    /// Classification of the state, `None` for in-progress and successful states
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            SessionState::FormatInvalid => Some(FailureClass::UserCorrectable),
            SessionState::TokenTimeout
            | SessionState::TokenExhausted
            | SessionState::EmailConflict => Some(FailureClass::UserTerminal),
            SessionState::DeliveryFailed | SessionState::DirectoryFailed => {
                Some(FailureClass::Infrastructure)
            }
            SessionState::Superseded => Some(FailureClass::Superseded),
            SessionState::Idle
            | SessionState::AwaitingEmail
            | SessionState::Validating
            | SessionState::AwaitingToken
            | SessionState::TokenEntered
            | SessionState::Verified => None,
        }
    }

    /// Stable name for logs and presentation layers
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingEmail => "awaiting_email",
            SessionState::FormatInvalid => "format_invalid",
            SessionState::Validating => "validating",
            SessionState::AwaitingToken => "awaiting_token",
            SessionState::TokenEntered => "token_entered",
            SessionState::Verified => "verified",
            SessionState::TokenTimeout => "token_timeout",
            SessionState::TokenExhausted => "token_exhausted",
            SessionState::EmailConflict => "email_conflict",
            SessionState::DeliveryFailed => "delivery_failed",
            SessionState::DirectoryFailed => "directory_failed",
            SessionState::Superseded => "superseded",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
