//! Value objects representing immutable domain concepts.

pub mod session_snapshot;

// Re-export commonly used types
pub use session_snapshot::{ConflictSource, SessionNotice, SessionSnapshot};
