//! Rejections returned by the session supervisor
//!
//! These are expected outcomes rather than faults: they tell the caller why a
//! request was not turned into a transition. Each carries a stable code for
//! presentation layers.

use thiserror::Error;

use crate::domain::entities::SessionState;

/// Why a verification session could not be started
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartRejected {
    #[error("Identity is already verified")]
    AlreadyVerified { email: Option<String> },

    #[error("Identity is cooling down for {remaining_seconds} more seconds")]
    CoolingDown { remaining_seconds: u64 },

    #[error("Directory is not loaded yet")]
    NotReady,

    #[error("Directory unavailable: {message}")]
    DirectoryUnavailable { message: String },

    #[error("A session for this identity is already being started")]
    AlreadyInProgress,
}

impl StartRejected {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StartRejected::AlreadyVerified { .. } => "ALREADY_VERIFIED",
            StartRejected::CoolingDown { .. } => "COOLING_DOWN",
            StartRejected::NotReady => "NOT_READY",
            StartRejected::DirectoryUnavailable { .. } => "DIRECTORY_UNAVAILABLE",
            StartRejected::AlreadyInProgress => "ALREADY_IN_PROGRESS",
        }
    }
}

/// Why an input could not be routed to a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteRejected {
    /// The session already ended (or was superseded); the input is stale
    #[error("Session is closed ({state})")]
    SessionClosed { state: SessionState },

    /// The session is alive but not waiting for this kind of input
    #[error("Session is not expecting this input ({state})")]
    UnexpectedStep { state: SessionState },
}

impl RouteRejected {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            RouteRejected::SessionClosed { .. } => "SESSION_CLOSED",
            RouteRejected::UnexpectedStep { .. } => "UNEXPECTED_STEP",
        }
    }

    /// State of the session when the input arrived
    pub fn state(&self) -> SessionState {
        match self {
            RouteRejected::SessionClosed { state } | RouteRejected::UnexpectedStep { state } => {
                *state
            }
        }
    }
}
