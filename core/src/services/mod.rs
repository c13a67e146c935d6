//! Business services containing domain logic and use cases.

pub mod verification;

// Re-export commonly used types
pub use verification::{
    CooldownRegistry, DeliveryError, DeliveryReceipt, EmailOutcome, NoopPresenter,
    NotificationSender, PendingRegistry, Presenter, SessionHandle, SessionSupervisor,
    TokenGenerator, TokenOutcome,
};
