//! In-memory directory, used for tests and single-process deployments

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::entities::{Identity, VerifiedMember};
use crate::errors::{DomainError, DomainResult};

use super::r#trait::Directory;

/// Directory backed by a map guarded by an async lock
pub struct InMemoryDirectory {
    members: Arc<RwLock<HashMap<Identity, VerifiedMember>>>,
    ready: AtomicBool,
}

impl InMemoryDirectory {
    /// Create an empty, ready directory
    pub fn new() -> Self {
        Self {
            members: Arc::new(RwLock::new(HashMap::new())),
            ready: AtomicBool::new(true),
        }
    }

    /// Create an empty directory that refuses sessions until `mark_loaded`
    pub fn unloaded() -> Self {
        let directory = Self::new();
        directory.ready.store(false, Ordering::SeqCst);
        directory
    }

    /// Create a ready directory seeded with members
    pub fn with_members(members: impl IntoIterator<Item = VerifiedMember>) -> Self {
        let map = members
            .into_iter()
            .map(|member| (member.identity.clone(), member))
            .collect();
        Self {
            members: Arc::new(RwLock::new(map)),
            ready: AtomicBool::new(true),
        }
    }

    /// Signal that loading finished
    pub fn mark_loaded(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// All verified members, in no particular order
    pub async fn members(&self) -> Vec<VerifiedMember> {
        self.members.read().await.values().cloned().collect()
    }

    /// Remove a binding, returning it if present
    pub async fn remove(&self, identity: &Identity) -> Option<VerifiedMember> {
        self.members.write().await.remove(identity)
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn find_member(&self, identity: &Identity) -> DomainResult<Option<VerifiedMember>> {
        let members = self.members.read().await;
        Ok(members.get(identity).cloned())
    }

    async fn is_email_taken(&self, email: &str) -> DomainResult<bool> {
        let members = self.members.read().await;
        Ok(members.values().any(|m| m.email.eq_ignore_ascii_case(email)))
    }

    async fn commit(
        &self,
        identity: &Identity,
        name: &str,
        email: &str,
    ) -> DomainResult<VerifiedMember> {
        let mut members = self.members.write().await;

        if members
            .values()
            .any(|m| m.identity != *identity && m.email.eq_ignore_ascii_case(email))
        {
            return Err(DomainError::Conflict {
                message: format!("email already bound to another identity: {}", email),
            });
        }

        let member = VerifiedMember::new(identity.clone(), name, email);
        members.insert(identity.clone(), member.clone());
        Ok(member)
    }
}
