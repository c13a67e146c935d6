//! Email Service Module
//!
//! Delivers verification tokens by email.
//!
//! ## Features
//!
//! - **Email Service Trait**: Common interface for all transports
//! - **Mock Implementation**: Console output and an in-memory outbox
//! - **HTTP Relay**: Transactional mail relay with retry and backoff
//! - **Failover**: Primary relay with automatic fallback to a backup relay
//! - **Notifier Adapter**: Bridges a transport to the verification core

use std::time::Duration;

pub mod email_service;
pub mod failover_email;
pub mod http_relay;
pub mod mock_email;
pub mod notifier_adapter;
pub mod template;

pub use email_service::{EmailMessage, EmailService};
pub use failover_email::FailoverEmailService;
pub use http_relay::{HttpRelayConfig, HttpRelayEmailService};
pub use mock_email::MockEmailService;
pub use notifier_adapter::EmailNotifier;
pub use template::TokenEmailTemplate;

use crate::config::EmailConfig;
use crate::InfrastructureError;

#[cfg(test)]
mod tests;

/// Create an email service based on configuration
///
/// # Arguments
///
/// * `config` - Email configuration naming the transport and its settings
///
/// # Returns
///
/// A boxed transport, or a configuration error when the named transport
/// cannot be built
pub fn create_email_service(
    config: &EmailConfig,
) -> Result<Box<dyn EmailService>, InfrastructureError> {
    match config.provider.as_str() {
        "mock" => Ok(Box::new(MockEmailService::new())),
        "http" => {
            let relay = HttpRelayEmailService::new(relay_config(
                config,
                &config.relay_url,
                &config.api_key,
            ))?;
            Ok(Box::new(relay))
        }
        "failover" => {
            let primary = HttpRelayEmailService::new(relay_config(
                config,
                &config.relay_url,
                &config.api_key,
            ))?
            .with_name("PrimaryRelay");
            let backup = HttpRelayEmailService::new(relay_config(
                config,
                &config.backup_relay_url,
                &config.backup_api_key,
            ))?
            .with_name("BackupRelay");

            tracing::info!("Created failover email service with two mail relays");
            Ok(Box::new(FailoverEmailService::new(
                Box::new(primary),
                Box::new(backup),
                Duration::from_secs(config.failover_timeout_secs),
            )))
        }
        other => Err(InfrastructureError::Config(format!(
            "Unknown email provider '{}'",
            other
        ))),
    }
}

fn relay_config(config: &EmailConfig, endpoint: &str, api_key: &str) -> HttpRelayConfig {
    HttpRelayConfig {
        endpoint: endpoint.to_string(),
        api_key: api_key.to_string(),
        from_address: config.from_address.clone(),
        max_retries: config.max_retries,
        retry_delay_ms: config.retry_delay_ms,
        request_timeout_secs: config.request_timeout_secs,
    }
}
