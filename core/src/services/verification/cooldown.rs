//! Post-exhaustion lockouts
//!
//! An identity that burns through its token attempts is locked out of new
//! sessions for a configured duration. Lockouts live in memory only.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::entities::Identity;

/// Lockout information for one identity
#[derive(Debug, Clone)]
pub struct CooldownInfo {
    /// When the lockout started
    pub locked_at: DateTime<Utc>,
    /// Wrong tokens that led to the lockout
    pub failed_attempts: u32,
    expires_at: Instant,
}

impl CooldownInfo {
    /// Time left before the lockout expires
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// `now + duration`, clamped to roughly 30 years ahead when that overflows
fn deadline_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

/// Registry of identities that are cooling down
#[derive(Debug)]
pub struct CooldownRegistry {
    duration: Duration,
    locks: Mutex<HashMap<Identity, CooldownInfo>>,
}

impl CooldownRegistry {
    /// Create a registry that locks identities out for `duration`
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<Identity, CooldownInfo>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configured lockout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start (or restart) a lockout for `identity`
    pub fn lock(&self, identity: &Identity, failed_attempts: u32) -> CooldownInfo {
        let info = CooldownInfo {
            locked_at: Utc::now(),
            failed_attempts,
            expires_at: deadline_after(self.duration),
        };

        tracing::warn!(
            identity = %identity,
            event = "identity_cooldown_started",
            failed_attempts = failed_attempts,
            cooldown_seconds = self.duration.as_secs(),
            "Identity locked out after exhausting token attempts"
        );

        self.locks().insert(identity.clone(), info.clone());
        info
    }

    /// Time left on the lockout for `identity`, if any
    ///
    /// Expired lockouts are purged on lookup.
    pub fn remaining(&self, identity: &Identity) -> Option<Duration> {
        let mut locks = self.locks();
        let remaining = locks.get(identity).map(CooldownInfo::remaining)?;
        if remaining.is_zero() {
            locks.remove(identity);
            return None;
        }
        Some(remaining)
    }

    /// Lockout details for `identity`, if still active
    pub fn get(&self, identity: &Identity) -> Option<CooldownInfo> {
        self.remaining(identity)?;
        self.locks().get(identity).cloned()
    }

    /// Lift a lockout early; returns whether one was active
    pub fn lift(&self, identity: &Identity) -> bool {
        let lifted = self.locks().remove(identity).is_some();
        if lifted {
            tracing::info!(
                identity = %identity,
                event = "identity_cooldown_lifted",
                "Identity lockout lifted"
            );
        }
        lifted
    }
}
