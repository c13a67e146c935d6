//! Verification token generation

use constant_time_eq::constant_time_eq;
use rand::{rngs::OsRng, RngCore};

/// Generates short hexadecimal tokens from the operating system CSPRNG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenGenerator {
    length: usize,
}

impl TokenGenerator {
    /// Create a generator for tokens of `length` hex characters
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Number of characters in generated tokens
    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a fresh token
    ///
    /// Each call draws new entropy; tokens are never derived from the identity
    /// or the email address.
    pub fn generate(&self) -> String {
        let mut bytes = vec![0u8; self.length.div_ceil(2)];
        OsRng.fill_bytes(&mut bytes);
        let mut token = hex::encode(bytes);
        token.truncate(self.length);
        token
    }
}

/// Compare a stored token against user input in constant time
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    constant_time_eq(expected.as_bytes(), provided.as_bytes())
}
