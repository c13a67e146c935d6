//! Entry point for starting verification sessions and routing input to them

use cv_shared::VerificationConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::domain::entities::{Identity, SessionState};
use crate::domain::value_objects::SessionSnapshot;
use crate::errors::{DomainResult, RouteRejected, StartRejected};
use crate::repositories::Directory;

use super::cooldown::CooldownRegistry;
use super::pending_registry::PendingRegistry;
use super::session::{SessionDeps, SessionTable, VerificationSession};
use super::token_generator::TokenGenerator;
use super::traits::{NotificationSender, Presenter};
use super::types::{EmailOutcome, TokenOutcome};

/// Handle to a started session, used to route later input
pub struct SessionHandle<D: ?Sized, N: ?Sized, P: ?Sized> {
    session: Arc<VerificationSession<D, N, P>>,
}

impl<D: ?Sized, N: ?Sized, P: ?Sized> Clone for SessionHandle<D, N, P> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<D, N, P> SessionHandle<D, N, P>
where
    D: Directory + ?Sized + 'static,
    N: NotificationSender + ?Sized + 'static,
    P: Presenter + ?Sized + 'static,
{
    pub fn id(&self) -> uuid::Uuid {
        self.session.id()
    }

    pub fn identity(&self) -> &Identity {
        self.session.identity()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }
}

/// Applies the one-session-per-identity rule and routes input to sessions
///
/// Owns the pending registry, the cooldown registry and the table of live
/// sessions. Nothing here is global; construct one supervisor per process and
/// share it by reference.
pub struct SessionSupervisor<
    D: ?Sized = dyn Directory,
    N: ?Sized = dyn NotificationSender,
    P: ?Sized = dyn Presenter,
> {
    deps: Arc<SessionDeps<D, N, P>>,
    sessions: Arc<SessionTable<D, N, P>>,
}

impl<D, N, P> SessionSupervisor<D, N, P>
where
    D: Directory + ?Sized + 'static,
    N: NotificationSender + ?Sized + 'static,
    P: Presenter + ?Sized + 'static,
{
    /// Create a supervisor
    ///
    /// # Arguments
    ///
    /// * `directory` - Store of verified members
    /// * `notifier` - Token transport
    /// * `presenter` - Observer notified on every transition
    /// * `config` - Session policy; rejected if it cannot be honored
    pub fn new(
        directory: Arc<D>,
        notifier: Arc<N>,
        presenter: Arc<P>,
        config: VerificationConfig,
    ) -> DomainResult<Self> {
        config.validate()?;

        let deps = SessionDeps {
            directory,
            notifier,
            presenter,
            registry: Arc::new(PendingRegistry::new()),
            cooldowns: Arc::new(CooldownRegistry::new(config.cooldown())),
            tokens: TokenGenerator::new(config.token_length),
            config,
        };

        Ok(Self {
            deps: Arc::new(deps),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Identity, Arc<VerificationSession<D, N, P>>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a verification session for `identity`
    ///
    /// An identity that already has a live session gets a brand-new one; the
    /// old one is superseded and its reservations released.
    pub async fn start(&self, identity: Identity) -> Result<SessionHandle<D, N, P>, StartRejected> {
        if !self.deps.directory.is_ready() {
            return Err(StartRejected::NotReady);
        }

        if let Some(remaining) = self.deps.cooldowns.remaining(&identity) {
            let remaining_seconds = ceil_seconds(remaining);
            tracing::info!(
                identity = %identity,
                event = "start_rejected",
                reason = "cooling_down",
                remaining_seconds = remaining_seconds,
                "Identity is cooling down"
            );
            return Err(StartRejected::CoolingDown { remaining_seconds });
        }

        match self.deps.directory.find_member(&identity).await {
            Ok(Some(member)) => {
                tracing::info!(
                    identity = %identity,
                    event = "start_rejected",
                    reason = "already_verified",
                    "Identity is already verified"
                );
                return Err(StartRejected::AlreadyVerified {
                    email: Some(member.email),
                });
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(
                    identity = %identity,
                    event = "directory_lookup_failed",
                    error = %err,
                    "Directory lookup failed while starting a session"
                );
                return Err(StartRejected::DirectoryUnavailable {
                    message: err.to_string(),
                });
            }
        }

        let mut sessions = self.sessions();

        if let Some(previous) = sessions.remove(&identity) {
            if previous.supersede() {
                tracing::info!(
                    identity = %identity,
                    event = "session_superseded",
                    session_id = %previous.id(),
                    "Previous session superseded by a new start"
                );
            }
        }

        let session = Arc::new(VerificationSession::new(
            identity.clone(),
            Arc::clone(&self.deps),
            Arc::downgrade(&self.sessions),
        ));

        if !self.deps.registry.try_reserve_identity(&identity, session.id()) {
            tracing::warn!(
                identity = %identity,
                event = "start_rejected",
                reason = "already_in_progress",
                "Identity reservation held by another session"
            );
            return Err(StartRejected::AlreadyInProgress);
        }

        sessions.insert(identity.clone(), Arc::clone(&session));
        session.begin();

        tracing::info!(
            identity = %identity,
            event = "session_started",
            session_id = %session.id(),
            "Verification session started"
        );

        Ok(SessionHandle { session })
    }

    /// Forward an email submission to the session behind `handle`
    pub async fn route_email(
        &self,
        handle: &SessionHandle<D, N, P>,
        text: &str,
    ) -> Result<EmailOutcome, RouteRejected> {
        handle.session.submit_email(text).await
    }

    /// Forward a token submission to the session behind `handle`
    pub async fn route_token(
        &self,
        handle: &SessionHandle<D, N, P>,
        text: &str,
    ) -> Result<TokenOutcome, RouteRejected> {
        handle.session.submit_token(text).await
    }

    /// Handle to the live session for `identity`, if any
    pub fn handle(&self, identity: &Identity) -> Option<SessionHandle<D, N, P>> {
        self.sessions()
            .get(identity)
            .map(|session| SessionHandle {
                session: Arc::clone(session),
            })
    }

    /// Snapshot of the live session for `identity`, if any
    pub fn snapshot(&self, identity: &Identity) -> Option<SessionSnapshot> {
        let session = self.sessions().get(identity).cloned()?;
        Some(session.snapshot())
    }

    /// Number of live sessions
    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }

    /// Time left on the cooldown for `identity`, if any
    pub fn cooldown_remaining(&self, identity: &Identity) -> Option<Duration> {
        self.deps.cooldowns.remaining(identity)
    }

    /// Lift a cooldown early; returns whether one was active
    pub fn lift_cooldown(&self, identity: &Identity) -> bool {
        self.deps.cooldowns.lift(identity)
    }

    pub fn registry(&self) -> &PendingRegistry {
        &self.deps.registry
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.deps.config
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    let seconds = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        seconds + 1
    } else {
        seconds
    }
}
