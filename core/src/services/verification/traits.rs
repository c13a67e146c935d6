//! Collaborator traits the verification core calls out to

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::value_objects::SessionSnapshot;

/// Acknowledgement returned by a successful delivery request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Identifier assigned by the transport
    pub message_id: String,
}

/// Why a token could not be delivered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The transport rejected the address; the session fails
    #[error("Address rejected: {reason}")]
    Rejected { reason: String },

    /// A transient problem; the token is assumed delivered
    #[error("Transient delivery failure: {reason}")]
    Transient { reason: String },
}

impl DeliveryError {
    /// Whether the failure should end the session
    pub fn is_hard(&self) -> bool {
        matches!(self, DeliveryError::Rejected { .. })
    }
}

/// Trait for token delivery
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Request delivery of `token` to `email`
    async fn deliver(&self, email: &str, token: &str) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Observer notified on every session transition
///
/// Called synchronously while the transition is being applied. Implementations
/// must return quickly and must not call back into the supervisor or the
/// session; hand the snapshot off to a channel or task instead.
pub trait Presenter: Send + Sync {
    fn on_transition(&self, snapshot: &SessionSnapshot);
}

/// Presenter that ignores every transition
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPresenter;

impl Presenter for NoopPresenter {
    fn on_transition(&self, _snapshot: &SessionSnapshot) {}
}
