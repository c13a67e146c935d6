//! Email service trait shared by every transport

use async_trait::async_trait;
use serde::Serialize;

use super::template::TokenEmailTemplate;
use crate::InfrastructureError;

/// A rendered message ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Email transport
///
/// `send_email` returns the transport's message id. Errors are split by how
/// the caller should react:
/// - `InfrastructureError::EmailRejected` - the transport refused the message
///   or the recipient; retrying will not help
/// - any other error - the message may or may not have gone out
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Send a rendered message
    async fn send_email(&self, message: &EmailMessage) -> Result<String, InfrastructureError>;

    /// Render and send a verification token message
    async fn send_verification_token(
        &self,
        template: &TokenEmailTemplate,
        to: &str,
        token: &str,
    ) -> Result<String, InfrastructureError> {
        let message = template.render(to, token);
        self.send_email(&message).await
    }

    /// Name used in logs
    fn provider_name(&self) -> &str;

    /// Whether the transport is currently usable
    async fn is_available(&self) -> bool {
        true
    }
}
