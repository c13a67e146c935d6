//! Verification session policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{env_or, ConfigError};

/// Default institutional email domain
pub const DEFAULT_EMAIL_DOMAIN: &str = "ulb.be";

/// Default length of the verification token (hex characters)
pub const DEFAULT_TOKEN_LENGTH: usize = 10;

/// Default token validity window (10 minutes)
pub const DEFAULT_TOKEN_VALIDITY_SECONDS: u64 = 600;

/// Default number of token guesses before the session is exhausted
pub const DEFAULT_MAX_TOKEN_ATTEMPTS: u32 = 5;

/// Default cooldown after exhausting the token attempts (5 minutes)
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 300;

/// Upper bound for the token validity window and the cooldown (10 years)
pub const MAX_WINDOW_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Configuration for verification sessions
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VerificationConfig {
    /// Institutional email domains accepted for verification (lowercase)
    pub email_domains: Vec<String>,

    /// Number of characters in a generated token
    pub token_length: usize,

    /// Seconds a delivered token stays valid
    pub token_validity_seconds: u64,

    /// Wrong-token submissions allowed before the session is exhausted
    pub max_token_attempts: u32,

    /// Seconds an identity is locked out after exhausting its attempts
    pub cooldown_seconds: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            email_domains: vec![DEFAULT_EMAIL_DOMAIN.to_string()],
            token_length: DEFAULT_TOKEN_LENGTH,
            token_validity_seconds: DEFAULT_TOKEN_VALIDITY_SECONDS,
            max_token_attempts: DEFAULT_MAX_TOKEN_ATTEMPTS,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
        }
    }
}

impl VerificationConfig {
    /// Create from environment variables
    ///
    /// Recognized variables:
    /// - `VERIFICATION_EMAIL_DOMAINS` (comma separated)
    /// - `VERIFICATION_TOKEN_LENGTH`
    /// - `VERIFICATION_TOKEN_VALIDITY_SECONDS`
    /// - `VERIFICATION_MAX_TOKEN_ATTEMPTS`
    /// - `VERIFICATION_COOLDOWN_SECONDS`
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let email_domains = match std::env::var("VERIFICATION_EMAIL_DOMAINS") {
            Ok(raw) => parse_domains(&raw),
            Err(_) => defaults.email_domains,
        };

        Ok(Self {
            email_domains,
            token_length: env_or("VERIFICATION_TOKEN_LENGTH", defaults.token_length)?,
            token_validity_seconds: env_or(
                "VERIFICATION_TOKEN_VALIDITY_SECONDS",
                defaults.token_validity_seconds,
            )?,
            max_token_attempts: env_or(
                "VERIFICATION_MAX_TOKEN_ATTEMPTS",
                defaults.max_token_attempts,
            )?,
            cooldown_seconds: env_or("VERIFICATION_COOLDOWN_SECONDS", defaults.cooldown_seconds)?,
        })
    }

    /// Replace the accepted institutional domains
    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.email_domains = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    /// Set the maximum number of token attempts
    pub fn with_max_token_attempts(mut self, attempts: u32) -> Self {
        self.max_token_attempts = attempts;
        self
    }

    /// Set the token validity window in seconds
    pub fn with_token_validity_seconds(mut self, seconds: u64) -> Self {
        self.token_validity_seconds = seconds;
        self
    }

    /// Set the post-exhaustion cooldown in seconds
    pub fn with_cooldown_seconds(mut self, seconds: u64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    /// Token validity as a `Duration`
    pub fn token_validity(&self) -> Duration {
        Duration::from_secs(self.token_validity_seconds)
    }

    /// Cooldown as a `Duration`
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    /// Whether `domain` is one of the configured institutional domains
    pub fn is_allowed_domain(&self, domain: &str) -> bool {
        self.email_domains
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(domain))
    }

    /// Check the configuration for values the session state machine cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.email_domains.is_empty() {
            return Err(ConfigError::Constraint {
                message: "at least one institutional email domain is required".to_string(),
            });
        }
        if self.token_length == 0 {
            return Err(ConfigError::Constraint {
                message: "token length must be greater than zero".to_string(),
            });
        }
        if self.max_token_attempts == 0 {
            return Err(ConfigError::Constraint {
                message: "at least one token attempt must be allowed".to_string(),
            });
        }
        if self.token_validity_seconds == 0 {
            return Err(ConfigError::Constraint {
                message: "token validity must be greater than zero".to_string(),
            });
        }
        if self.token_validity_seconds > MAX_WINDOW_SECONDS {
            return Err(ConfigError::Constraint {
                message: format!("token validity must not exceed {} seconds", MAX_WINDOW_SECONDS),
            });
        }
        if self.cooldown_seconds > MAX_WINDOW_SECONDS {
            return Err(ConfigError::Constraint {
                message: format!("cooldown must not exceed {} seconds", MAX_WINDOW_SECONDS),
            });
        }
        Ok(())
    }
}

fn parse_domains(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = VerificationConfig::default();
        assert_eq!(config.email_domains, vec!["ulb.be".to_string()]);
        assert_eq!(config.token_length, 10);
        assert_eq!(config.token_validity(), Duration::from_secs(600));
        assert_eq!(config.max_token_attempts, 5);
        assert_eq!(config.cooldown(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_allowed_domain_is_exact_and_case_insensitive() {
        let config = VerificationConfig::default();
        assert!(config.is_allowed_domain("ulb.be"));
        assert!(config.is_allowed_domain("ULB.be"));
        assert!(!config.is_allowed_domain("b.be"));
        assert!(!config.is_allowed_domain("ulb.be.evil"));
    }

    #[test]
    fn test_with_domains_normalizes() {
        let config = VerificationConfig::default().with_domains([" ULB.BE ", "", "vub.be"]);
        assert_eq!(config.email_domains, vec!["ulb.be", "vub.be"]);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = VerificationConfig::default().with_max_token_attempts(0);
        assert!(matches!(config.validate(), Err(ConfigError::Constraint { .. })));
    }

    #[test]
    fn test_validate_rejects_empty_domains() {
        let config = VerificationConfig::default().with_domains(Vec::<String>::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_validity() {
        let config = VerificationConfig::default().with_token_validity_seconds(100_000_000_000_000_000);
        assert!(matches!(config.validate(), Err(ConfigError::Constraint { .. })));

        let config = VerificationConfig::default().with_token_validity_seconds(MAX_WINDOW_SECONDS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unbounded_cooldown() {
        let config = VerificationConfig::default().with_cooldown_seconds(u64::MAX);
        assert!(matches!(config.validate(), Err(ConfigError::Constraint { .. })));

        let config = VerificationConfig::default().with_cooldown_seconds(MAX_WINDOW_SECONDS + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_domains() {
        assert_eq!(parse_domains("ulb.be, VUB.be,,"), vec!["ulb.be", "vub.be"]);
    }

    #[test]
    fn test_serialization() {
        let config = VerificationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: VerificationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
