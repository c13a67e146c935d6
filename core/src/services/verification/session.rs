//! One verification attempt and its state machine
//!
//! Lock order is table, then session, then registry/cooldowns. No guard is
//! ever held across an `.await`; every async step re-checks the state it
//! started from before applying its result.

use chrono::{DateTime, Utc};
use cv_shared::email::{mask_email, EmailAddress};
use cv_shared::VerificationConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::domain::entities::{derive_display_name, Identity, SessionState};
use crate::domain::value_objects::{ConflictSource, SessionNotice, SessionSnapshot};
use crate::errors::{DomainError, RouteRejected};
use crate::repositories::Directory;

use super::cooldown::CooldownRegistry;
use super::pending_registry::PendingRegistry;
use super::token_generator::{tokens_match, TokenGenerator};
use super::traits::{DeliveryError, NotificationSender, Presenter};
use super::types::{EmailOutcome, TokenOutcome};

/// Collaborators shared by every session of one supervisor
pub(crate) struct SessionDeps<D: ?Sized, N: ?Sized, P: ?Sized> {
    pub directory: Arc<D>,
    pub notifier: Arc<N>,
    pub presenter: Arc<P>,
    pub registry: Arc<PendingRegistry>,
    pub cooldowns: Arc<CooldownRegistry>,
    pub config: VerificationConfig,
    pub tokens: TokenGenerator,
}

/// Live sessions keyed by identity
pub(crate) type SessionTable<D, N, P> =
    Mutex<HashMap<Identity, Arc<VerificationSession<D, N, P>>>>;

#[derive(Default)]
struct SessionInner {
    state: SessionState,
    email: Option<String>,
    token: Option<String>,
    attempt_count: u32,
    token_expires_at: Option<DateTime<Utc>>,
    holds_email: bool,
    timer: Option<AbortHandle>,
    notice: Option<SessionNotice>,
}

/// A single verification attempt for one identity
pub struct VerificationSession<D: ?Sized, N: ?Sized, P: ?Sized> {
    id: Uuid,
    identity: Identity,
    created_at: DateTime<Utc>,
    deps: Arc<SessionDeps<D, N, P>>,
    table: Weak<SessionTable<D, N, P>>,
    inner: Mutex<SessionInner>,
}

impl<D, N, P> VerificationSession<D, N, P>
where
    D: Directory + ?Sized + 'static,
    N: NotificationSender + ?Sized + 'static,
    P: Presenter + ?Sized + 'static,
{
    pub(crate) fn new(
        identity: Identity,
        deps: Arc<SessionDeps<D, N, P>>,
        table: Weak<SessionTable<D, N, P>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            created_at: Utc::now(),
            deps,
            table,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Current view of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        self.snapshot_of(&inner)
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, inner: &SessionInner) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            identity: self.identity.clone(),
            state: inner.state,
            email: inner.email.clone(),
            attempt_count: inner.attempt_count,
            max_attempts: self.deps.config.max_token_attempts,
            created_at: self.created_at,
            token_expires_at: inner.token_expires_at,
            notice: inner.notice.clone(),
        }
    }

    fn publish(&self, inner: &SessionInner) {
        self.deps.presenter.on_transition(&self.snapshot_of(inner));
    }

    /// Idle -> AwaitingEmail
    pub(crate) fn begin(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::Idle {
            inner.state = SessionState::AwaitingEmail;
            self.publish(&inner);
        }
    }

    /// Submit a candidate institutional email address
    ///
    /// Rejected with `SessionClosed` once the session is terminal, and with
    /// `UnexpectedStep` while it is not waiting for an address.
    pub async fn submit_email(self: &Arc<Self>, text: &str) -> Result<EmailOutcome, RouteRejected> {
        {
            let mut inner = self.lock();
            check_step(&inner, SessionState::accepts_email)?;
            inner.state = SessionState::Validating;
            inner.notice = None;
            self.publish(&inner);
        }

        let address = match EmailAddress::parse(text) {
            Ok(address) => address,
            Err(err) => {
                tracing::debug!(
                    session_id = %self.id,
                    event = "email_format_invalid",
                    code = err.code(),
                    "Submitted email is malformed"
                );
                return self.reject_format(
                    SessionNotice::InvalidEmail(err.clone()),
                    EmailOutcome::FormatInvalid(err),
                );
            }
        };

        if !self.deps.config.is_allowed_domain(address.domain()) {
            let domain = address.domain().to_string();
            tracing::debug!(
                session_id = %self.id,
                event = "email_domain_not_allowed",
                domain = %domain,
                "Submitted email is outside the institutional domains"
            );
            return self.reject_format(
                SessionNotice::DomainNotAllowed {
                    domain: domain.clone(),
                },
                EmailOutcome::DomainNotAllowed { domain },
            );
        }

        let email = address.to_string();
        {
            let mut inner = self.lock();
            if inner.state != SessionState::Validating {
                return Err(RouteRejected::SessionClosed { state: inner.state });
            }
            inner.email = Some(email.clone());
        }

        match self.deps.directory.is_email_taken(&email).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::info!(
                    session_id = %self.id,
                    event = "email_conflict",
                    email = %mask_email(&email),
                    source = "directory",
                    "Email already bound to a verified member"
                );
                return self
                    .finish_if(
                        SessionState::Validating,
                        SessionState::EmailConflict,
                        Some(SessionNotice::EmailTaken {
                            source: ConflictSource::Directory,
                        }),
                    )
                    .map(|_| EmailOutcome::EmailConflict {
                        source: ConflictSource::Directory,
                    });
            }
            Err(err) => {
                let reason = err.to_string();
                tracing::error!(
                    session_id = %self.id,
                    event = "directory_lookup_failed",
                    error = %reason,
                    "Directory lookup failed while validating email"
                );
                return self
                    .finish_if(
                        SessionState::Validating,
                        SessionState::DirectoryFailed,
                        Some(SessionNotice::DirectoryFailed {
                            reason: reason.clone(),
                        }),
                    )
                    .map(|_| EmailOutcome::DirectoryFailed { reason });
            }
        }

        let (token, expires_at) = {
            let mut inner = self.lock();
            if inner.state != SessionState::Validating {
                return Err(RouteRejected::SessionClosed { state: inner.state });
            }

            if !self.deps.registry.try_reserve_email(&email, self.id) {
                tracing::info!(
                    session_id = %self.id,
                    event = "email_conflict",
                    email = %mask_email(&email),
                    source = "pending",
                    "Email claimed by another pending session"
                );
                self.finish(
                    &mut inner,
                    SessionState::EmailConflict,
                    Some(SessionNotice::EmailTaken {
                        source: ConflictSource::Pending,
                    }),
                );
                drop(inner);
                self.deregister();
                return Ok(EmailOutcome::EmailConflict {
                    source: ConflictSource::Pending,
                });
            }
            inner.holds_email = true;

            let token = self.deps.tokens.generate();
            let expires_at = expiry_after(self.deps.config.token_validity_seconds);
            inner.token = Some(token.clone());
            inner.token_expires_at = Some(expires_at);
            inner.state = SessionState::AwaitingToken;
            inner.timer = Some(self.arm_timer());
            self.publish(&inner);
            (token, expires_at)
        };

        match self.deps.notifier.deliver(&email, &token).await {
            Ok(receipt) => {
                tracing::info!(
                    session_id = %self.id,
                    event = "token_delivery_requested",
                    email = %mask_email(&email),
                    message_id = %receipt.message_id,
                    "Verification token handed to transport"
                );
            }
            Err(DeliveryError::Transient { reason }) => {
                tracing::warn!(
                    session_id = %self.id,
                    event = "token_delivery_soft_failure",
                    email = %mask_email(&email),
                    error = %reason,
                    "Transient delivery failure, assuming delivered"
                );
            }
            Err(DeliveryError::Rejected { reason }) => {
                tracing::error!(
                    session_id = %self.id,
                    event = "token_delivery_failed",
                    email = %mask_email(&email),
                    error = %reason,
                    "Transport rejected the address"
                );
                let mut inner = self.lock();
                match inner.state {
                    SessionState::AwaitingToken => {
                        self.finish(
                            &mut inner,
                            SessionState::DeliveryFailed,
                            Some(SessionNotice::DeliveryFailed {
                                reason: reason.clone(),
                            }),
                        );
                        drop(inner);
                        self.deregister();
                        return Ok(EmailOutcome::DeliveryFailed { reason });
                    }
                    state if state.is_terminal() && state != SessionState::Verified => {
                        return Err(RouteRejected::SessionClosed { state });
                    }
                    // The token was entered, so it did arrive
                    _ => {}
                }
            }
        }

        let state = self.state();
        if state.is_terminal() && state != SessionState::Verified {
            return Err(RouteRejected::SessionClosed { state });
        }
        Ok(EmailOutcome::TokenSent { email, expires_at })
    }

    /// Submit a token guess
    ///
    /// Wrong guesses count against the attempt budget but never reset the
    /// validity window.
    pub async fn submit_token(self: &Arc<Self>, text: &str) -> Result<TokenOutcome, RouteRejected> {
        let email = {
            let mut inner = self.lock();
            check_step(&inner, SessionState::accepts_token)?;

            // The timer may lag behind the wall clock; an overdue token never matches
            if inner.token_expires_at.is_some_and(|at| Utc::now() >= at) {
                self.time_out(&mut inner);
                drop(inner);
                self.deregister();
                return Err(RouteRejected::SessionClosed {
                    state: SessionState::TokenTimeout,
                });
            }

            let matched = inner
                .token
                .as_deref()
                .map(|token| tokens_match(token, text.trim()))
                .unwrap_or(false);

            if !matched {
                inner.attempt_count += 1;
                let max_attempts = self.deps.config.max_token_attempts;

                if inner.attempt_count >= max_attempts {
                    let attempts = inner.attempt_count;
                    self.deps.cooldowns.lock(&self.identity, attempts);
                    let cooldown = self.deps.cooldowns.duration();
                    self.finish(
                        &mut inner,
                        SessionState::TokenExhausted,
                        Some(SessionNotice::CooldownStarted {
                            seconds: cooldown.as_secs(),
                        }),
                    );
                    drop(inner);
                    self.deregister();
                    return Ok(TokenOutcome::Exhausted { cooldown });
                }

                let remaining_attempts = max_attempts - inner.attempt_count;
                tracing::info!(
                    session_id = %self.id,
                    event = "token_mismatch",
                    attempt = inner.attempt_count,
                    remaining_attempts = remaining_attempts,
                    "Wrong verification token"
                );
                inner.notice = Some(SessionNotice::WrongToken { remaining_attempts });
                self.publish(&inner);
                return Ok(TokenOutcome::WrongToken { remaining_attempts });
            }

            let Some(email) = inner.email.clone() else {
                return Err(RouteRejected::UnexpectedStep { state: inner.state });
            };
            inner.state = SessionState::TokenEntered;
            inner.notice = None;
            if let Some(timer) = inner.timer.take() {
                timer.abort();
            }
            self.publish(&inner);
            email
        };

        match self.deps.directory.is_email_taken(&email).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::warn!(
                    session_id = %self.id,
                    event = "email_conflict",
                    email = %mask_email(&email),
                    source = "directory",
                    "Email bound to another member while the token was out"
                );
                return self
                    .finish_if(
                        SessionState::TokenEntered,
                        SessionState::EmailConflict,
                        Some(SessionNotice::EmailTaken {
                            source: ConflictSource::Directory,
                        }),
                    )
                    .map(|_| TokenOutcome::EmailConflict {
                        source: ConflictSource::Directory,
                    });
            }
            Err(err) => return self.fail_directory(err),
        }

        if !self.deps.registry.is_email_held_by(&email, self.id) {
            return self
                .finish_if(
                    SessionState::TokenEntered,
                    SessionState::EmailConflict,
                    Some(SessionNotice::EmailTaken {
                        source: ConflictSource::Pending,
                    }),
                )
                .map(|_| TokenOutcome::EmailConflict {
                    source: ConflictSource::Pending,
                });
        }

        let local_part = email.split_once('@').map_or(email.as_str(), |(local, _)| local);
        let name = derive_display_name(local_part);

        match self.deps.directory.commit(&self.identity, &name, &email).await {
            Ok(member) => {
                let mut inner = self.lock();
                if inner.state != SessionState::TokenEntered {
                    tracing::warn!(
                        session_id = %self.id,
                        event = "commit_after_close",
                        state = %inner.state,
                        "Session closed while committing; binding kept"
                    );
                    return Err(RouteRejected::SessionClosed { state: inner.state });
                }
                self.finish(&mut inner, SessionState::Verified, None);
                drop(inner);
                self.deregister();

                tracing::info!(
                    session_id = %self.id,
                    event = "verification_completed",
                    identity = %self.identity,
                    email = %mask_email(&email),
                    "Identity verified"
                );
                Ok(TokenOutcome::Verified { member })
            }
            Err(DomainError::Conflict { message }) => {
                tracing::warn!(
                    session_id = %self.id,
                    event = "email_conflict",
                    source = "commit",
                    error = %message,
                    "Directory refused the binding"
                );
                self.finish_if(
                    SessionState::TokenEntered,
                    SessionState::EmailConflict,
                    Some(SessionNotice::EmailTaken {
                        source: ConflictSource::Directory,
                    }),
                )
                .map(|_| TokenOutcome::EmailConflict {
                    source: ConflictSource::Directory,
                })
            }
            Err(err) => self.fail_directory(err),
        }
    }

    fn fail_directory(&self, err: DomainError) -> Result<TokenOutcome, RouteRejected> {
        let reason = err.to_string();
        tracing::error!(
            session_id = %self.id,
            event = "directory_failed",
            error = %reason,
            "Directory failed while confirming the token"
        );
        self.finish_if(
            SessionState::TokenEntered,
            SessionState::DirectoryFailed,
            Some(SessionNotice::DirectoryFailed {
                reason: reason.clone(),
            }),
        )
        .map(|_| TokenOutcome::DirectoryFailed { reason })
    }

    fn reject_format(
        &self,
        notice: SessionNotice,
        outcome: EmailOutcome,
    ) -> Result<EmailOutcome, RouteRejected> {
        let mut inner = self.lock();
        if inner.state != SessionState::Validating {
            return Err(RouteRejected::SessionClosed { state: inner.state });
        }
        inner.state = SessionState::FormatInvalid;
        inner.notice = Some(notice);
        self.publish(&inner);
        Ok(outcome)
    }

    fn arm_timer(self: &Arc<Self>) -> AbortHandle {
        let session = Arc::downgrade(self);
        let validity = self.deps.config.token_validity();
        tokio::spawn(async move {
            tokio::time::sleep(validity).await;
            if let Some(session) = session.upgrade() {
                session.expire();
            }
        })
        .abort_handle()
    }

    /// AwaitingToken -> TokenTimeout, a no-op in any other state
    fn expire(&self) {
        let mut inner = self.lock();
        if inner.state != SessionState::AwaitingToken {
            return;
        }
        // Firing task; nothing left to abort
        inner.timer = None;
        self.time_out(&mut inner);
        drop(inner);
        self.deregister();
    }

    fn time_out(&self, inner: &mut SessionInner) {
        tracing::info!(
            session_id = %self.id,
            event = "token_expired",
            "Verification token expired"
        );
        self.finish(inner, SessionState::TokenTimeout, None);
    }

    /// Any non-terminal state -> Superseded
    ///
    /// Called by the supervisor with the table locked, so the entry is not
    /// removed here.
    pub(crate) fn supersede(&self) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        self.finish(&mut inner, SessionState::Superseded, None);
        true
    }

    /// Finish when still in `expected`, otherwise report the session closed
    fn finish_if(
        &self,
        expected: SessionState,
        terminal: SessionState,
        notice: Option<SessionNotice>,
    ) -> Result<(), RouteRejected> {
        let mut inner = self.lock();
        if inner.state != expected {
            return Err(RouteRejected::SessionClosed { state: inner.state });
        }
        self.finish(&mut inner, terminal, notice);
        drop(inner);
        self.deregister();
        Ok(())
    }

    /// Enter a terminal state: drop the token, cancel the timer, release reservations
    fn finish(&self, inner: &mut SessionInner, state: SessionState, notice: Option<SessionNotice>) {
        inner.state = state;
        inner.notice = notice;
        inner.token = None;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        if inner.holds_email {
            if let Some(email) = inner.email.as_deref() {
                self.deps.registry.release_email(email, self.id);
            }
            inner.holds_email = false;
        }
        self.deps.registry.release_identity(&self.identity, self.id);

        tracing::debug!(
            session_id = %self.id,
            event = "session_finished",
            state = %state,
            attempts = inner.attempt_count,
            "Verification session ended"
        );
        self.publish(inner);
    }

    /// Remove this session from the supervisor table if it is still the current one
    fn deregister(&self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut sessions = table.lock().unwrap_or_else(PoisonError::into_inner);
        if sessions.get(&self.identity).map(|s| s.id) == Some(self.id) {
            sessions.remove(&self.identity);
        }
    }
}

/// Wall-clock instant `seconds` from now, saturating at the latest representable time
fn expiry_after(seconds: u64) -> DateTime<Utc> {
    i64::try_from(seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|validity| Utc::now().checked_add_signed(validity))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn check_step(
    inner: &SessionInner,
    accepts: fn(&SessionState) -> bool,
) -> Result<(), RouteRejected> {
    if inner.state.is_terminal() {
        return Err(RouteRejected::SessionClosed { state: inner.state });
    }
    if !accepts(&inner.state) {
        return Err(RouteRejected::UnexpectedStep { state: inner.state });
    }
    Ok(())
}
