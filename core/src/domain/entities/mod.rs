//! Domain entities representing core verification objects.

pub mod identity;
pub mod member;
pub mod session_state;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use identity::Identity;
pub use member::{derive_display_name, VerifiedMember};
pub use session_state::{FailureClass, SessionState};
