//! Failover Email Service Implementation
//!
//! Sends through a primary transport and falls back to a backup one while the
//! primary is failing. A rejection from the primary is returned as is; the
//! backup would refuse the same recipient.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::email_service::{EmailMessage, EmailService};
use crate::InfrastructureError;

#[derive(Debug, Clone, Default)]
struct FailoverState {
    /// Whether we're currently using the backup service
    using_backup: bool,
    /// When the primary service last failed
    last_primary_failure: Option<Instant>,
    /// Number of consecutive failures on primary
    primary_failure_count: u32,
}

/// Email service with automatic failover capability
pub struct FailoverEmailService {
    primary: Box<dyn EmailService>,
    backup: Box<dyn EmailService>,
    state: Arc<RwLock<FailoverState>>,
    /// How long to wait before retrying primary after failure
    failover_timeout: Duration,
}

impl FailoverEmailService {
    /// Create a new failover email service
    ///
    /// # Arguments
    ///
    /// * `primary` - The transport tried first
    /// * `backup` - The transport used while the primary is failing
    /// * `failover_timeout` - How long to wait before retrying the primary
    pub fn new(
        primary: Box<dyn EmailService>,
        backup: Box<dyn EmailService>,
        failover_timeout: Duration,
    ) -> Self {
        info!(
            "Initializing failover email service with {} (primary) and {} (backup)",
            primary.provider_name(),
            backup.provider_name()
        );

        Self {
            primary,
            backup,
            state: Arc::new(RwLock::new(FailoverState::default())),
            failover_timeout,
        }
    }

    /// Whether the backup transport is currently in use
    pub async fn is_using_backup(&self) -> bool {
        self.state.read().await.using_backup
    }

    /// Consecutive primary failures since the last success
    pub async fn primary_failure_count(&self) -> u32 {
        self.state.read().await.primary_failure_count
    }

    async fn should_retry_primary(&self) -> bool {
        let state = self.state.read().await;

        if !state.using_backup {
            return true;
        }

        match state.last_primary_failure {
            Some(last_failure) => last_failure.elapsed() > self.failover_timeout,
            None => true,
        }
    }

    async fn record_primary_failure(&self) {
        let mut state = self.state.write().await;

        state.primary_failure_count += 1;
        state.last_primary_failure = Some(Instant::now());

        if !state.using_backup {
            warn!(
                "Primary email service ({}) failed, switching to backup ({})",
                self.primary.provider_name(),
                self.backup.provider_name()
            );
            state.using_backup = true;
        }
    }

    async fn record_primary_success(&self) {
        let mut state = self.state.write().await;

        if state.using_backup {
            info!(
                "Primary email service ({}) recovered, switching back from backup",
                self.primary.provider_name()
            );
        }

        *state = FailoverState::default();
    }
}

#[async_trait]
impl EmailService for FailoverEmailService {
    async fn send_email(&self, message: &EmailMessage) -> Result<String, InfrastructureError> {
        if self.should_retry_primary().await {
            match self.primary.send_email(message).await {
                Ok(result) => {
                    self.record_primary_success().await;
                    return Ok(result);
                }
                Err(e @ InfrastructureError::EmailRejected(_)) => return Err(e),
                Err(e) => {
                    error!(
                        "Primary email service ({}) failed: {}",
                        self.primary.provider_name(),
                        e
                    );
                    self.record_primary_failure().await;
                }
            }
        }

        info!(
            "Using backup email service ({}) to send message",
            self.backup.provider_name()
        );

        match self.backup.send_email(message).await {
            Ok(result) => Ok(result),
            Err(e @ InfrastructureError::EmailRejected(_)) => Err(e),
            Err(e) => {
                error!(
                    "Backup email service ({}) also failed: {}",
                    self.backup.provider_name(),
                    e
                );
                Err(InfrastructureError::Email(format!(
                    "Both primary and backup email services failed. Primary: {}, Backup: {}",
                    self.primary.provider_name(),
                    self.backup.provider_name()
                )))
            }
        }
    }

    fn provider_name(&self) -> &str {
        "Failover"
    }

    async fn is_available(&self) -> bool {
        let primary_available = self.primary.is_available().await;
        let backup_available = self.backup.is_available().await;

        if !primary_available && backup_available {
            self.record_primary_failure().await;
        } else if primary_available {
            self.record_primary_success().await;
        }

        primary_available || backup_available
    }
}
