//! Email address utilities
//!
//! Institutional addresses have a deliberately narrow shape: one `@`, a
//! non-empty local part, and a domain made of exactly two non-empty labels
//! (`ulb.be`). Anything else is rejected before availability is checked.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

// Characters accepted in the local part (RFC 5322 atext plus dots)
static LOCAL_PART_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9!#$%&'*+/=?^_`{|}~.\-]+$").expect("local part regex is valid")
});

// Characters accepted in a domain label
static DOMAIN_LABEL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9\-]+$").expect("domain label regex is valid"));

/// Reasons an email string is not a well-formed institutional address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailFormatError {
    #[error("Email address is empty")]
    Empty,

    #[error("Email address must contain exactly one '@'")]
    AtSignCount,

    #[error("Email local part is empty")]
    EmptyLocalPart,

    #[error("Email domain must be two non-empty labels separated by a single '.'")]
    InvalidDomain,

    #[error("Email address contains unsupported characters")]
    InvalidCharacters,
}

impl EmailFormatError {
    /// Stable error code for presentation layers
    pub fn code(&self) -> &'static str {
        match self {
            EmailFormatError::Empty => "EMAIL_EMPTY",
            EmailFormatError::AtSignCount => "EMAIL_AT_SIGN",
            EmailFormatError::EmptyLocalPart => "EMAIL_EMPTY_LOCAL_PART",
            EmailFormatError::InvalidDomain => "EMAIL_INVALID_DOMAIN",
            EmailFormatError::InvalidCharacters => "EMAIL_INVALID_CHARACTERS",
        }
    }
}

/// A parsed, normalized (trimmed and lowercased) email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    local: String,
    domain: String,
}

impl EmailAddress {
    /// Parse and normalize a user-supplied email string
    ///
    /// # Example
    ///
    /// ```
    /// use cv_shared::email::EmailAddress;
    ///
    /// let email = EmailAddress::parse(" T.Verhaegen@ULB.be ").unwrap();
    /// assert_eq!(email.local_part(), "t.verhaegen");
    /// assert_eq!(email.domain(), "ulb.be");
    /// assert!(EmailAddress::parse("not-an-email").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, EmailFormatError> {
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(EmailFormatError::Empty);
        }

        let mut parts = normalized.split('@');
        let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => (local, domain),
            _ => return Err(EmailFormatError::AtSignCount),
        };

        if local.is_empty() {
            return Err(EmailFormatError::EmptyLocalPart);
        }

        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() != 2 || labels.iter().any(|label| label.is_empty()) {
            return Err(EmailFormatError::InvalidDomain);
        }

        if !LOCAL_PART_REGEX.is_match(local)
            || !labels.iter().all(|label| DOMAIN_LABEL_REGEX.is_match(label))
        {
            return Err(EmailFormatError::InvalidCharacters);
        }

        Ok(Self {
            local: local.to_string(),
            domain: domain.to_string(),
        })
    }

    /// The part before `@`
    pub fn local_part(&self) -> &str {
        &self.local
    }

    /// The part after `@`
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// Mask an email address for logging
///
/// Keeps the first character of the local part and the whole domain.
///
/// ```
/// use cv_shared::email::mask_email;
///
/// assert_eq!(mask_email("t.verhaegen@ulb.be"), "t**********@ulb.be");
/// assert_eq!(mask_email("garbage"), "*******");
/// ```
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let mut chars = local.chars();
            match chars.next() {
                Some(first) => format!("{}{}@{}", first, "*".repeat(chars.count()), domain),
                None => format!("@{}", domain),
            }
        }
        None => "*".repeat(email.chars().count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_address() {
        let email = EmailAddress::parse("t.verhaegen@ulb.be").unwrap();
        assert_eq!(email.local_part(), "t.verhaegen");
        assert_eq!(email.domain(), "ulb.be");
        assert_eq!(email.to_string(), "t.verhaegen@ulb.be");
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let email = EmailAddress::parse("  Jean.Dupont@ULB.BE\n").unwrap();
        assert_eq!(email.to_string(), "jean.dupont@ulb.be");
    }

    #[test]
    fn test_parse_rejects_missing_at() {
        assert_eq!(
            EmailAddress::parse("not-an-email"),
            Err(EmailFormatError::AtSignCount)
        );
    }

    #[test]
    fn test_parse_rejects_multiple_at() {
        assert_eq!(
            EmailAddress::parse("a@b@ulb.be"),
            Err(EmailFormatError::AtSignCount)
        );
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert_eq!(EmailAddress::parse("   "), Err(EmailFormatError::Empty));
    }

    #[test]
    fn test_parse_rejects_empty_local_part() {
        assert_eq!(
            EmailAddress::parse("@ulb.be"),
            Err(EmailFormatError::EmptyLocalPart)
        );
    }

    #[test]
    fn test_parse_rejects_bad_domains() {
        for input in ["a@ulb", "a@ulb.", "a@.be", "a@mail.ulb.be", "a@"] {
            assert_eq!(
                EmailAddress::parse(input),
                Err(EmailFormatError::InvalidDomain),
                "{input}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_inner_whitespace() {
        assert_eq!(
            EmailAddress::parse("t verhaegen@ulb.be"),
            Err(EmailFormatError::InvalidCharacters)
        );
    }

    #[test]
    fn test_mask_email_short_local() {
        assert_eq!(mask_email("a@ulb.be"), "a@ulb.be");
        assert_eq!(mask_email("@ulb.be"), "@ulb.be");
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            EmailFormatError::Empty.code(),
            EmailFormatError::AtSignCount.code(),
            EmailFormatError::EmptyLocalPart.code(),
            EmailFormatError::InvalidDomain.code(),
            EmailFormatError::InvalidCharacters.code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
