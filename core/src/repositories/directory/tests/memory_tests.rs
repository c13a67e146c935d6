//! Unit tests for the in-memory directory

use crate::domain::entities::{Identity, VerifiedMember};
use crate::errors::DomainError;
use crate::repositories::directory::{Directory, InMemoryDirectory};

#[tokio::test]
async fn test_commit_and_find_member() {
    let directory = InMemoryDirectory::new();
    let identity = Identity::from("u1");

    let member = directory
        .commit(&identity, "T Verhaegen", "t.verhaegen@ulb.be")
        .await
        .unwrap();
    assert_eq!(member.name, "T Verhaegen");

    let found = directory.find_member(&identity).await.unwrap();
    assert_eq!(found.map(|m| m.email), Some("t.verhaegen@ulb.be".to_string()));
    assert!(directory.is_identity_verified(&identity).await.unwrap());
    assert!(directory.is_email_taken("T.Verhaegen@ulb.be").await.unwrap());
    assert!(!directory.is_email_taken("other@ulb.be").await.unwrap());
}

#[tokio::test]
async fn test_commit_rejects_email_bound_elsewhere() {
    let directory = InMemoryDirectory::with_members([VerifiedMember::new(
        Identity::from("u1"),
        "A",
        "a@ulb.be",
    )]);

    let result = directory.commit(&Identity::from("u2"), "A", "a@ulb.be").await;
    assert!(matches!(result, Err(DomainError::Conflict { .. })));
    assert_eq!(directory.members().await.len(), 1);
}

#[tokio::test]
async fn test_recommit_same_identity_replaces_binding() {
    let directory = InMemoryDirectory::new();
    let identity = Identity::from("u1");

    directory.commit(&identity, "A", "a@ulb.be").await.unwrap();
    directory.commit(&identity, "B", "b@ulb.be").await.unwrap();

    assert!(!directory.is_email_taken("a@ulb.be").await.unwrap());
    assert!(directory.is_email_taken("b@ulb.be").await.unwrap());
}

#[tokio::test]
async fn test_unloaded_directory_is_not_ready() {
    let directory = InMemoryDirectory::unloaded();
    assert!(!directory.is_ready());

    directory.mark_loaded();
    assert!(directory.is_ready());
}

#[tokio::test]
async fn test_remove_member() {
    let directory = InMemoryDirectory::new();
    let identity = Identity::from("u1");
    directory.commit(&identity, "A", "a@ulb.be").await.unwrap();

    assert!(directory.remove(&identity).await.is_some());
    assert!(!directory.is_identity_verified(&identity).await.unwrap());
}
