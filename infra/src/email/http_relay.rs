//! HTTP Mail Relay Implementation
//!
//! Sends messages by POSTing JSON to a transactional mail relay.
//!
//! ## Features
//!
//! - Bearer token authentication
//! - Automatic retry with exponential backoff on 429, 5xx and network errors
//! - Client errors (other 4xx) fail immediately as rejections
//! - Recipient masking in logs

use async_trait::async_trait;
use cv_shared::config::{env_or, ConfigError};
use cv_shared::email::mask_email;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::email_service::{EmailMessage, EmailService};
use crate::InfrastructureError;

/// Relay configuration
#[derive(Debug, Clone)]
pub struct HttpRelayConfig {
    /// Endpoint receiving the POST
    pub endpoint: String,
    /// Bearer token
    pub api_key: String,
    /// Sender address
    pub from_address: String,
    /// Maximum attempts for one message
    pub max_retries: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Timeout for API requests in seconds
    pub request_timeout_secs: u64,
}

impl HttpRelayConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, InfrastructureError> {
        let endpoint = std::env::var("EMAIL_RELAY_URL")
            .map_err(|_| InfrastructureError::Config("EMAIL_RELAY_URL not set".to_string()))?;
        let api_key = std::env::var("EMAIL_RELAY_API_KEY")
            .map_err(|_| InfrastructureError::Config("EMAIL_RELAY_API_KEY not set".to_string()))?;
        let from_address = std::env::var("EMAIL_FROM_ADDRESS")
            .map_err(|_| InfrastructureError::Config("EMAIL_FROM_ADDRESS not set".to_string()))?;

        Ok(Self {
            endpoint,
            api_key,
            from_address,
            max_retries: env_or("EMAIL_RELAY_MAX_RETRIES", 3).map_err(config_error)?,
            retry_delay_ms: env_or("EMAIL_RELAY_RETRY_DELAY_MS", 1000).map_err(config_error)?,
            request_timeout_secs: env_or("EMAIL_RELAY_REQUEST_TIMEOUT_SECS", 30)
                .map_err(config_error)?,
        })
    }
}

fn config_error(e: ConfigError) -> InfrastructureError {
    InfrastructureError::Config(e.to_string())
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(alias = "message_id", alias = "messageId")]
    id: Option<String>,
}

/// Mail relay reached over HTTP
pub struct HttpRelayEmailService {
    client: reqwest::Client,
    config: HttpRelayConfig,
    name: String,
}

impl HttpRelayEmailService {
    /// Create a new relay client
    pub fn new(config: HttpRelayConfig) -> Result<Self, InfrastructureError> {
        if config.endpoint.trim().is_empty() {
            return Err(InfrastructureError::Config(
                "Mail relay endpoint must not be empty".to_string(),
            ));
        }
        if config.max_retries == 0 {
            return Err(InfrastructureError::Config(
                "Mail relay max_retries must be at least 1".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!(
            "Mail relay initialized for {} with sender {}",
            config.endpoint,
            mask_email(&config.from_address)
        );

        Ok(Self {
            client,
            config,
            name: "HttpRelay".to_string(),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, InfrastructureError> {
        Self::new(HttpRelayConfig::from_env()?)
    }

    /// Override the name used in logs
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Send with retry logic
    async fn send_with_retry(&self, message: &EmailMessage) -> Result<String, InfrastructureError> {
        let masked = mask_email(&message.to);
        let body = RelayRequest {
            from: &self.config.from_address,
            to: &message.to,
            subject: &message.subject,
            html: &message.html_body,
            text: &message.text_body,
        };

        let mut attempts = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            attempts += 1;

            debug!(
                "Sending email attempt {}/{} to {}",
                attempts, self.config.max_retries, masked
            );

            let failure = match self
                .client
                .post(&self.config.endpoint)
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    // Relays that answer without an id still accepted the message
                    let message_id = response
                        .json::<RelayResponse>()
                        .await
                        .ok()
                        .and_then(|r| r.id)
                        .unwrap_or_else(|| format!("relay_{}", Uuid::new_v4()));

                    info!(
                        target: "email_service",
                        provider = %self.name,
                        recipient = %masked,
                        message_id = %message_id,
                        "Email sent successfully"
                    );
                    return Ok(message_id);
                }
                Ok(response) => {
                    let status = response.status();
                    let detail = response.text().await.unwrap_or_default();

                    if !is_retryable(status) {
                        error!(
                            provider = %self.name,
                            recipient = %masked,
                            status = status.as_u16(),
                            "Mail relay rejected the message"
                        );
                        return Err(InfrastructureError::EmailRejected(format!(
                            "{} {}",
                            status, detail
                        )));
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        warn!("Rate limit detected, backing off for {:?}", delay);
                    } else {
                        warn!("Server error {} detected, retrying after {:?}", status, delay);
                    }
                    format!("{} {}", status, detail)
                }
                Err(e) => {
                    warn!("Mail relay request failed: {}", e);
                    e.to_string()
                }
            };

            if attempts >= self.config.max_retries {
                error!(
                    provider = %self.name,
                    recipient = %masked,
                    "Giving up on email after {} attempts",
                    attempts
                );
                return Err(InfrastructureError::Email(format!(
                    "Failed to send email after {} attempts: {}",
                    attempts, failure
                )));
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl EmailService for HttpRelayEmailService {
    async fn send_email(&self, message: &EmailMessage) -> Result<String, InfrastructureError> {
        self.send_with_retry(message).await
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
