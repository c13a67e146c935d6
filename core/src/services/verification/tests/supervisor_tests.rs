//! Unit tests for the session supervisor

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use cv_shared::VerificationConfig;

use crate::domain::entities::{Identity, SessionState, VerifiedMember};
use crate::errors::{DomainError, StartRejected};
use crate::repositories::{Directory, InMemoryDirectory};
use crate::services::verification::{
    EmailOutcome, NoopPresenter, NotificationSender, Presenter, SessionSupervisor, TokenOutcome,
};

use super::mocks::{harness, MockNotifier, RecordingPresenter};

#[tokio::test]
async fn test_new_rejects_invalid_config() {
    let result = SessionSupervisor::new(
        Arc::new(InMemoryDirectory::new()),
        Arc::new(MockNotifier::new()),
        Arc::new(NoopPresenter),
        VerificationConfig::default().with_max_token_attempts(0),
    );
    assert!(matches!(result, Err(DomainError::Config(_))));
}

#[tokio::test]
async fn test_new_rejects_unbounded_windows() {
    for config in [
        VerificationConfig::default().with_token_validity_seconds(100_000_000_000_000_000),
        VerificationConfig::default().with_cooldown_seconds(u64::MAX),
    ] {
        let result = SessionSupervisor::new(
            Arc::new(InMemoryDirectory::new()),
            Arc::new(MockNotifier::new()),
            Arc::new(NoopPresenter),
            config,
        );
        assert!(matches!(result, Err(DomainError::Config(_))));
    }
}

#[tokio::test]
async fn test_start_before_directory_loaded() {
    let directory = Arc::new(InMemoryDirectory::unloaded());
    let supervisor = SessionSupervisor::new(
        directory.clone(),
        Arc::new(MockNotifier::new()),
        Arc::new(RecordingPresenter::new()),
        VerificationConfig::default(),
    )
    .unwrap();

    let rejected = supervisor.start(Identity::from("u1")).await.err();
    assert_eq!(rejected, Some(StartRejected::NotReady));

    directory.mark_loaded();
    assert!(supervisor.start(Identity::from("u1")).await.is_ok());
}

#[tokio::test]
async fn test_start_rejects_verified_identity() {
    let h = harness(VerificationConfig::default());
    let identity = Identity::from("u1");
    h.directory
        .commit(&identity, "T Verhaegen", "t.verhaegen@ulb.be")
        .await
        .unwrap();

    let rejected = h.supervisor.start(identity.clone()).await.err();
    assert_eq!(
        rejected,
        Some(StartRejected::AlreadyVerified {
            email: Some("t.verhaegen@ulb.be".to_string())
        })
    );
    assert!(h.supervisor.registry().is_empty());
    assert!(h.presenter.states_for(&identity).is_empty());
}

#[tokio::test]
async fn test_start_reports_directory_failure() {
    let h = harness(VerificationConfig::default());
    h.directory.fail_lookups.store(true, Ordering::SeqCst);

    let rejected = h.supervisor.start(Identity::from("u1")).await.err().unwrap();
    assert!(matches!(rejected, StartRejected::DirectoryUnavailable { .. }));
    assert_eq!(h.supervisor.active_sessions(), 0);
}

#[tokio::test]
async fn test_start_reserves_identity_and_awaits_email() {
    let h = harness(VerificationConfig::default());
    let identity = Identity::from("u1");

    let handle = h.supervisor.start(identity.clone()).await.unwrap();

    assert_eq!(handle.state(), SessionState::AwaitingEmail);
    assert_eq!(handle.identity(), &identity);
    assert!(h.supervisor.registry().is_identity_reserved(&identity));
    assert_eq!(h.supervisor.active_sessions(), 1);
    assert_eq!(
        h.supervisor.snapshot(&identity).map(|s| s.session_id),
        Some(handle.id())
    );
}

#[tokio::test]
async fn test_restart_supersedes_previous_session() {
    let h = harness(VerificationConfig::default());
    let identity = Identity::from("u1");
    let first = h.supervisor.start(identity.clone()).await.unwrap();
    h.supervisor
        .route_email(&first, "a@ulb.be")
        .await
        .unwrap();

    let second = h.supervisor.start(identity.clone()).await.unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(first.state(), SessionState::Superseded);
    assert_eq!(second.state(), SessionState::AwaitingEmail);
    assert!(!h.supervisor.registry().is_email_reserved("a@ulb.be"));
    assert_eq!(h.supervisor.registry().identity_count(), 1);
    assert_eq!(h.supervisor.active_sessions(), 1);
    assert_eq!(
        h.supervisor.handle(&identity).map(|handle| handle.id()),
        Some(second.id())
    );

    // The old token is useless now
    let token = h.notifier.last_token("a@ulb.be").unwrap();
    assert!(h.supervisor.route_token(&first, &token).await.is_err());

    let outcome = h.supervisor.route_email(&second, "a@ulb.be").await.unwrap();
    assert!(matches!(outcome, EmailOutcome::TokenSent { .. }));
}

#[tokio::test]
async fn test_superseded_session_is_reported_once() {
    let h = harness(VerificationConfig::default());
    let identity = Identity::from("u1");
    h.supervisor.start(identity.clone()).await.unwrap();
    h.supervisor.start(identity.clone()).await.unwrap();

    let superseded = h
        .presenter
        .states_for(&identity)
        .into_iter()
        .filter(|s| *s == SessionState::Superseded)
        .count();
    assert_eq!(superseded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_blocks_restart_until_elapsed() {
    let config = VerificationConfig::default().with_max_token_attempts(1);
    let h = harness(config);
    let identity = Identity::from("u1");
    let handle = h.supervisor.start(identity.clone()).await.unwrap();
    h.supervisor.route_email(&handle, "a@ulb.be").await.unwrap();
    let outcome = h.supervisor.route_token(&handle, "wrong").await.unwrap();
    assert!(matches!(outcome, TokenOutcome::Exhausted { .. }));

    let rejected = h.supervisor.start(identity.clone()).await.err();
    assert_eq!(
        rejected,
        Some(StartRejected::CoolingDown {
            remaining_seconds: 300
        })
    );

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert!(h.supervisor.start(identity).await.is_ok());
}

#[tokio::test]
async fn test_lift_cooldown() {
    let config = VerificationConfig::default().with_max_token_attempts(1);
    let h = harness(config);
    let identity = Identity::from("u1");
    let handle = h.supervisor.start(identity.clone()).await.unwrap();
    h.supervisor.route_email(&handle, "a@ulb.be").await.unwrap();
    h.supervisor.route_token(&handle, "wrong").await.unwrap();

    assert!(h.supervisor.lift_cooldown(&identity));
    assert!(h.supervisor.cooldown_remaining(&identity).is_none());
    assert!(h.supervisor.start(identity).await.is_ok());
}

#[tokio::test]
async fn test_trait_object_supervisor() {
    let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::with_members([
        VerifiedMember::new(Identity::from("u0"), "A", "a@ulb.be"),
    ]));
    let notifier: Arc<dyn NotificationSender> = Arc::new(MockNotifier::new());
    let presenter: Arc<dyn Presenter> = Arc::new(NoopPresenter);

    let supervisor: SessionSupervisor =
        SessionSupervisor::new(directory, notifier, presenter, VerificationConfig::default())
            .unwrap();

    let handle = supervisor.start(Identity::from("u1")).await.unwrap();
    let outcome = supervisor.route_email(&handle, "a@ulb.be").await.unwrap();
    assert!(matches!(outcome, EmailOutcome::EmailConflict { .. }));
}
