//! Mock Email Service Implementation
//!
//! Logs messages instead of sending them and keeps an outbox for tests.

use async_trait::async_trait;
use cv_shared::email::mask_email;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

use super::email_service::{EmailMessage, EmailService};
use crate::InfrastructureError;

/// Mock email service for development and testing
///
/// This implementation:
/// - Prints messages to the console (optional)
/// - Records every accepted message
/// - Can simulate a transport outage or reject given recipients
#[derive(Clone)]
pub struct MockEmailService {
    /// Counter for tracking number of messages sent
    message_count: Arc<AtomicU64>,
    /// Accepted messages, oldest first
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
    /// Recipients refused outright
    rejected_recipients: Arc<Mutex<HashSet<String>>>,
    /// Whether to simulate failures (for testing)
    simulate_failure: bool,
    /// Whether to print messages to console
    console_output: bool,
}

impl MockEmailService {
    /// Create a new mock email service
    pub fn new() -> Self {
        Self::with_options(true, false)
    }

    /// Create a mock service with configurable options
    pub fn with_options(console_output: bool, simulate_failure: bool) -> Self {
        Self {
            message_count: Arc::new(AtomicU64::new(0)),
            outbox: Arc::new(Mutex::new(Vec::new())),
            rejected_recipients: Arc::new(Mutex::new(HashSet::new())),
            simulate_failure,
            console_output,
        }
    }

    /// Refuse every future message to `recipient`
    pub fn reject_recipient(&self, recipient: &str) {
        self.rejected_recipients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(recipient.to_lowercase());
    }

    /// Get the total number of messages sent
    pub fn get_message_count(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    /// Reset the message counter
    pub fn reset_counter(&self) {
        self.message_count.store(0, Ordering::SeqCst);
    }

    /// Enable or disable failure simulation
    pub fn set_simulate_failure(&mut self, simulate: bool) {
        self.simulate_failure = simulate;
    }

    /// Every accepted message
    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent message accepted for `recipient`
    pub fn last_message_to(&self, recipient: &str) -> Option<EmailMessage> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|m| m.to.eq_ignore_ascii_case(recipient))
            .cloned()
    }
}

impl Default for MockEmailService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_email(&self, message: &EmailMessage) -> Result<String, InfrastructureError> {
        let masked = mask_email(&message.to);

        let rejected = self
            .rejected_recipients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&message.to.to_lowercase());
        if rejected {
            warn!(
                target: "email_service",
                provider = "mock",
                recipient = %masked,
                "Mock email service rejecting recipient"
            );
            return Err(InfrastructureError::EmailRejected(format!(
                "Recipient refused: {}",
                masked
            )));
        }

        if self.simulate_failure {
            warn!(
                target: "email_service",
                provider = "mock",
                recipient = %masked,
                "Mock email service simulating failure"
            );
            return Err(InfrastructureError::Email(
                "Simulated email sending failure".to_string(),
            ));
        }

        let message_id = format!("mock_{}", Uuid::new_v4());
        let count = self.message_count.fetch_add(1, Ordering::SeqCst) + 1;

        if self.console_output {
            println!("\n{}", "=".repeat(60));
            println!("MOCK EMAIL SERVICE - MESSAGE #{}", count);
            println!("{}", "=".repeat(60));
            println!("To: {}", message.to);
            println!("Subject: {}", message.subject);
            println!("Message ID: {}", message_id);
            println!("{}", message.text_body);
            println!("{}\n", "=".repeat(60));
        }

        info!(
            target: "email_service",
            provider = "mock",
            recipient = %masked,
            message_id = %message_id,
            "Email sent successfully (mock)"
        );

        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());

        Ok(message_id)
    }

    fn provider_name(&self) -> &str {
        "Mock"
    }

    async fn is_available(&self) -> bool {
        !self.simulate_failure
    }
}
