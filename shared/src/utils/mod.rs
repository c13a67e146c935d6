//! Common utility functions

pub mod email;

pub use email::{mask_email, EmailAddress, EmailFormatError};
