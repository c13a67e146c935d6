//! Directory trait defining the interface to the store of verified members.
//!
//! The directory is the durable mapping of identity to verified email. It is
//! owned by some other part of the system and synchronized independently, so
//! every read is treated as possibly stale and availability is re-checked
//! before any commit.

use async_trait::async_trait;

use crate::domain::entities::{Identity, VerifiedMember};
use crate::errors::DomainResult;

/// Store of verified identity to email bindings
///
/// # Example Implementation
/// ```no_run
/// use async_trait::async_trait;
/// use cv_core::domain::{Identity, VerifiedMember};
/// use cv_core::errors::DomainResult;
/// use cv_core::repositories::Directory;
///
/// struct SpreadsheetDirectory {
///     // sheet client
/// }
///
/// #[async_trait]
/// impl Directory for SpreadsheetDirectory {
///     async fn find_member(&self, identity: &Identity) -> DomainResult<Option<VerifiedMember>> {
///         Ok(None)
///     }
///
///     async fn is_email_taken(&self, email: &str) -> DomainResult<bool> {
///         Ok(false)
///     }
///
///     async fn commit(
///         &self,
///         identity: &Identity,
///         name: &str,
///         email: &str,
///     ) -> DomainResult<VerifiedMember> {
///         Ok(VerifiedMember::new(identity.clone(), name, email))
///     }
/// }
/// ```
#[async_trait]
pub trait Directory: Send + Sync {
    /// Whether the directory has finished loading and can answer queries
    ///
    /// Sessions are refused with `NotReady` until this returns true.
    fn is_ready(&self) -> bool {
        true
    }

    /// Find the verified binding for an identity
    ///
    /// # Returns
    /// * `Ok(Some(member))` - identity is already verified
    /// * `Ok(None)` - identity has no binding
    /// * `Err(DomainError)` - the store could not be read
    async fn find_member(&self, identity: &Identity) -> DomainResult<Option<VerifiedMember>>;

    /// Whether the identity has a verified binding
    async fn is_identity_verified(&self, identity: &Identity) -> DomainResult<bool> {
        Ok(self.find_member(identity).await?.is_some())
    }

    /// Whether a normalized email address is bound to any verified identity
    async fn is_email_taken(&self, email: &str) -> DomainResult<bool>;

    /// Bind `identity` to `email` under the display name `name`
    ///
    /// May be slow. Implementations return `DomainError::Conflict` when the
    /// email is already bound to a different identity.
    async fn commit(
        &self,
        identity: &Identity,
        name: &str,
        email: &str,
    ) -> DomainResult<VerifiedMember>;
}
