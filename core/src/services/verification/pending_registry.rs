//! Process-wide registry of identities and emails that are mid-verification
//!
//! Every reservation records the session that owns it, so a release coming
//! from a stale (superseded) session can never free an entry that a newer
//! session has since taken.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::domain::entities::Identity;

#[derive(Debug, Default)]
struct Reservations {
    identities: HashMap<Identity, Uuid>,
    emails: HashMap<String, Uuid>,
}

/// Mutual exclusion between concurrent verification sessions
///
/// Check-and-insert is a single step under one lock.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    inner: Mutex<Reservations>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Reservations> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve `identity` for session `owner`
    ///
    /// Returns `false` if the identity is already reserved by any session.
    pub fn try_reserve_identity(&self, identity: &Identity, owner: Uuid) -> bool {
        let mut reservations = self.lock();
        if reservations.identities.contains_key(identity) {
            return false;
        }
        reservations.identities.insert(identity.clone(), owner);
        true
    }

    /// Reserve a normalized email for session `owner`
    ///
    /// Returns `false` if the email is already reserved by any session.
    pub fn try_reserve_email(&self, email: &str, owner: Uuid) -> bool {
        let mut reservations = self.lock();
        if reservations.emails.contains_key(email) {
            return false;
        }
        reservations.emails.insert(email.to_string(), owner);
        true
    }

    /// Release `identity` if `owner` holds it; otherwise do nothing
    pub fn release_identity(&self, identity: &Identity, owner: Uuid) {
        let mut reservations = self.lock();
        if reservations.identities.get(identity) == Some(&owner) {
            reservations.identities.remove(identity);
        }
    }

    /// Release `email` if `owner` holds it; otherwise do nothing
    pub fn release_email(&self, email: &str, owner: Uuid) {
        let mut reservations = self.lock();
        if reservations.emails.get(email) == Some(&owner) {
            reservations.emails.remove(email);
        }
    }

    pub fn is_identity_reserved(&self, identity: &Identity) -> bool {
        self.lock().identities.contains_key(identity)
    }

    pub fn is_email_reserved(&self, email: &str) -> bool {
        self.lock().emails.contains_key(email)
    }

    /// Whether `email` is currently reserved by session `owner`
    pub fn is_email_held_by(&self, email: &str, owner: Uuid) -> bool {
        self.lock().emails.get(email) == Some(&owner)
    }

    pub fn identity_count(&self) -> usize {
        self.lock().identities.len()
    }

    pub fn email_count(&self) -> usize {
        self.lock().emails.len()
    }

    /// Whether no identity and no email is reserved
    pub fn is_empty(&self) -> bool {
        let reservations = self.lock();
        reservations.identities.is_empty() && reservations.emails.is_empty()
    }
}
