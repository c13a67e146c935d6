//! Adapter exposing an email transport as the core's token notifier

use async_trait::async_trait;
use cv_core::services::verification::{DeliveryError, DeliveryReceipt, NotificationSender};
use std::sync::Arc;

use super::email_service::EmailService;
use super::template::TokenEmailTemplate;
use crate::InfrastructureError;

/// Delivers verification tokens by email
pub struct EmailNotifier<E: ?Sized> {
    email_service: Arc<E>,
    template: TokenEmailTemplate,
}

impl<E: EmailService + ?Sized> EmailNotifier<E> {
    pub fn new(email_service: Arc<E>, template: TokenEmailTemplate) -> Self {
        Self {
            email_service,
            template,
        }
    }

    pub fn template(&self) -> &TokenEmailTemplate {
        &self.template
    }
}

#[async_trait]
impl<E: EmailService + ?Sized> NotificationSender for EmailNotifier<E> {
    async fn deliver(&self, email: &str, token: &str) -> Result<DeliveryReceipt, DeliveryError> {
        match self
            .email_service
            .send_verification_token(&self.template, email, token)
            .await
        {
            Ok(message_id) => Ok(DeliveryReceipt { message_id }),
            Err(InfrastructureError::EmailRejected(reason)) => {
                Err(DeliveryError::Rejected { reason })
            }
            Err(e) => Err(DeliveryError::Transient {
                reason: e.to_string(),
            }),
        }
    }
}
