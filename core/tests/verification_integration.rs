//! Integration tests for verification sessions driven through the supervisor

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use cv_core::domain::{Identity, SessionState};
    use cv_core::errors::StartRejected;
    use cv_core::repositories::{Directory, InMemoryDirectory};
    use cv_core::services::verification::{
        DeliveryError, DeliveryReceipt, EmailOutcome, NoopPresenter, NotificationSender,
        SessionSupervisor, TokenOutcome,
    };
    use cv_core::ConflictSource;
    use cv_shared::VerificationConfig;

    // Mailbox keeping the last token per address
    struct Mailbox {
        tokens: Mutex<HashMap<String, String>>,
    }

    impl Mailbox {
        fn new() -> Self {
            Self {
                tokens: Mutex::new(HashMap::new()),
            }
        }

        fn token_for(&self, email: &str) -> String {
            self.tokens.lock().unwrap().get(email).cloned().unwrap()
        }
    }

    #[async_trait]
    impl NotificationSender for Mailbox {
        async fn deliver(
            &self,
            email: &str,
            token: &str,
        ) -> Result<DeliveryReceipt, DeliveryError> {
            self.tokens
                .lock()
                .unwrap()
                .insert(email.to_string(), token.to_string());
            Ok(DeliveryReceipt {
                message_id: format!("msg-{}", email),
            })
        }
    }

    type Supervisor = SessionSupervisor<InMemoryDirectory, Mailbox, NoopPresenter>;

    fn setup(config: VerificationConfig) -> (Arc<Supervisor>, Arc<InMemoryDirectory>, Arc<Mailbox>) {
        let directory = Arc::new(InMemoryDirectory::new());
        let mailbox = Arc::new(Mailbox::new());
        let supervisor = SessionSupervisor::new(
            directory.clone(),
            mailbox.clone(),
            Arc::new(NoopPresenter),
            config,
        )
        .unwrap();
        (Arc::new(supervisor), directory, mailbox)
    }

    #[tokio::test]
    async fn test_malformed_then_valid_email_verifies() {
        let (supervisor, directory, mailbox) = setup(VerificationConfig::default());
        let u1 = Identity::from("U1");

        let handle = supervisor.start(u1.clone()).await.unwrap();

        let outcome = supervisor.route_email(&handle, "not-an-email").await.unwrap();
        assert!(matches!(outcome, EmailOutcome::FormatInvalid(_)));
        assert!(handle.state().accepts_email());

        let outcome = supervisor
            .route_email(&handle, "t.verhaegen@ulb.be")
            .await
            .unwrap();
        assert!(matches!(outcome, EmailOutcome::TokenSent { .. }));
        assert_eq!(handle.state(), SessionState::AwaitingToken);

        let token = mailbox.token_for("t.verhaegen@ulb.be");
        let outcome = supervisor.route_token(&handle, &token).await.unwrap();

        match outcome {
            TokenOutcome::Verified { member } => {
                assert_eq!(member.identity, u1);
                assert_eq!(member.name, "T Verhaegen");
                assert_eq!(member.email, "t.verhaegen@ulb.be");
            }
            other => panic!("Expected Verified, got {:?}", other),
        }

        let stored = directory.find_member(&u1).await.unwrap().unwrap();
        assert_eq!(stored.name, "T Verhaegen");
        assert_eq!(stored.email, "t.verhaegen@ulb.be");
        assert!(supervisor.registry().is_empty());
        assert_eq!(supervisor.active_sessions(), 0);

        let rejected = supervisor.start(u1).await.err();
        assert!(matches!(rejected, Some(StartRejected::AlreadyVerified { .. })));
    }

    #[tokio::test]
    async fn test_pending_email_conflicts_for_second_identity() {
        let (supervisor, _directory, mailbox) = setup(VerificationConfig::default());
        let u1 = Identity::from("U1");
        let u2 = Identity::from("U2");

        let first = supervisor.start(u1).await.unwrap();
        supervisor.route_email(&first, "a@ulb.be").await.unwrap();
        assert_eq!(first.state(), SessionState::AwaitingToken);

        let second = supervisor.start(u2.clone()).await.unwrap();
        let outcome = supervisor.route_email(&second, "a@ulb.be").await.unwrap();

        assert_eq!(
            outcome,
            EmailOutcome::EmailConflict {
                source: ConflictSource::Pending
            }
        );
        assert_eq!(second.state(), SessionState::EmailConflict);
        assert!(!supervisor.registry().is_identity_reserved(&u2));

        // First session is unaffected
        assert_eq!(first.state(), SessionState::AwaitingToken);
        assert!(supervisor.registry().is_email_held_by("a@ulb.be", first.id()));
        let token = mailbox.token_for("a@ulb.be");
        let outcome = supervisor.route_token(&first, &token).await.unwrap();
        assert!(matches!(outcome, TokenOutcome::Verified { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_enforces_cooldown() {
        let config = VerificationConfig::default().with_max_token_attempts(2);
        let cooldown = config.cooldown();
        let (supervisor, _directory, _mailbox) = setup(config);
        let u1 = Identity::from("U1");

        let handle = supervisor.start(u1.clone()).await.unwrap();
        supervisor.route_email(&handle, "a@ulb.be").await.unwrap();

        let outcome = supervisor.route_token(&handle, "bad-one").await.unwrap();
        assert_eq!(outcome, TokenOutcome::WrongToken { remaining_attempts: 1 });
        let outcome = supervisor.route_token(&handle, "bad-two").await.unwrap();
        assert_eq!(outcome, TokenOutcome::Exhausted { cooldown });
        assert_eq!(handle.state(), SessionState::TokenExhausted);

        let rejected = supervisor.start(u1.clone()).await.err();
        assert!(matches!(rejected, Some(StartRejected::CoolingDown { .. })));

        tokio::time::sleep(cooldown - Duration::from_secs(1)).await;
        assert!(supervisor.start(u1.clone()).await.is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let handle = supervisor.start(u1).await.unwrap();
        assert_eq!(handle.state(), SessionState::AwaitingEmail);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_on_one_email_have_single_winner() {
        let (supervisor, _directory, _mailbox) = setup(VerificationConfig::default());

        let tasks: Vec<_> = (0..24)
            .map(|i| {
                let supervisor = Arc::clone(&supervisor);
                tokio::spawn(async move {
                    let handle = supervisor.start(Identity::from(i as u64)).await.unwrap();
                    supervisor.route_email(&handle, "shared@ulb.be").await.unwrap()
                })
            })
            .collect();

        let mut sent = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                EmailOutcome::TokenSent { .. } => sent += 1,
                EmailOutcome::EmailConflict {
                    source: ConflictSource::Pending,
                } => conflicts += 1,
                other => panic!("Unexpected outcome {:?}", other),
            }
        }

        assert_eq!(sent, 1);
        assert_eq!(conflicts, 23);
        assert_eq!(supervisor.registry().email_count(), 1);
        assert_eq!(supervisor.registry().identity_count(), 1);
        assert_eq!(supervisor.active_sessions(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_restarts_leave_one_live_session() {
        let (supervisor, _directory, _mailbox) = setup(VerificationConfig::default());
        let u1 = Identity::from("U1");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let supervisor = Arc::clone(&supervisor);
                let u1 = u1.clone();
                tokio::spawn(async move { supervisor.start(u1).await.ok() })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.extend(task.await.unwrap());
        }

        let live: Vec<_> = handles
            .iter()
            .filter(|h| !h.state().is_terminal())
            .collect();
        assert_eq!(live.len(), 1);
        assert!(handles
            .iter()
            .filter(|h| h.id() != live[0].id())
            .all(|h| h.state() == SessionState::Superseded));
        assert_eq!(supervisor.registry().identity_count(), 1);
        assert_eq!(supervisor.active_sessions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_drains_once_every_session_ends() {
        let config = VerificationConfig::default().with_max_token_attempts(1);
        let (supervisor, _directory, mailbox) = setup(config.clone());

        let verified = supervisor.start(Identity::from("A")).await.unwrap();
        supervisor.route_email(&verified, "a@ulb.be").await.unwrap();
        let token = mailbox.token_for("a@ulb.be");
        supervisor.route_token(&verified, &token).await.unwrap();

        let exhausted = supervisor.start(Identity::from("B")).await.unwrap();
        supervisor.route_email(&exhausted, "b@ulb.be").await.unwrap();
        supervisor.route_token(&exhausted, "nope").await.unwrap();

        let conflicted = supervisor.start(Identity::from("C")).await.unwrap();
        supervisor.route_email(&conflicted, "a@ulb.be").await.unwrap();

        let timed_out = supervisor.start(Identity::from("D")).await.unwrap();
        supervisor.route_email(&timed_out, "d@ulb.be").await.unwrap();

        let abandoned = supervisor.start(Identity::from("E")).await.unwrap();
        supervisor.start(Identity::from("E")).await.unwrap();
        assert_eq!(abandoned.state(), SessionState::Superseded);

        tokio::time::sleep(config.token_validity() + Duration::from_secs(1)).await;

        assert_eq!(verified.state(), SessionState::Verified);
        assert_eq!(exhausted.state(), SessionState::TokenExhausted);
        assert_eq!(conflicted.state(), SessionState::EmailConflict);
        assert_eq!(timed_out.state(), SessionState::TokenTimeout);

        // Only the restarted E session is still alive
        assert_eq!(supervisor.active_sessions(), 1);
        assert_eq!(supervisor.registry().identity_count(), 1);
        assert_eq!(supervisor.registry().email_count(), 0);
    }
}
