//! Verified member entity stored in the directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// A person whose institutional email address has been verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedMember {
    /// Identity that proved control of the address
    pub identity: Identity,

    /// Display name derived from the email local part
    pub name: String,

    /// Verified institutional email address (normalized)
    pub email: String,

    /// When the binding was committed
    pub verified_at: DateTime<Utc>,
}

impl VerifiedMember {
    /// Create a new member verified now
    pub fn new(identity: Identity, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            identity,
            name: name.into(),
            email: email.into(),
            verified_at: Utc::now(),
        }
    }
}

/// Derive a display name from an email local part
///
/// The local part is split on `.`, each segment is title-cased (first letter
/// of every alphabetic run upper-cased, the rest lower-cased) and the
/// segments are joined with a space.
///
/// # Example
///
/// ```
/// use cv_core::domain::derive_display_name;
///
/// assert_eq!(derive_display_name("t.verhaegen"), "T Verhaegen");
/// assert_eq!(derive_display_name("jean-luc.picard"), "Jean-Luc Picard");
/// ```
pub fn derive_display_name(local_part: &str) -> String {
    local_part
        .split('.')
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(segment: &str) -> String {
    let mut result = String::with_capacity(segment.len());
    let mut previous_is_letter = false;

    for c in segment.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            result.push(c);
            previous_is_letter = false;
        }
    }

    result
}
