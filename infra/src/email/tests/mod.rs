//! Unit tests for the email module

mod create_service_tests;

use crate::email::EmailMessage;

/// Pull the token out of a rendered message
pub(crate) fn token_in(message: &EmailMessage) -> String {
    let start = message.html_body.find("<code>").map(|i| i + "<code>".len()).unwrap();
    let end = message.html_body.find("</code>").unwrap();
    message.html_body[start..end].to_string()
}

pub(crate) fn sample_message(to: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Subject".to_string(),
        html_body: "<p>Token de vérification : <code>abc123</code></p>".to_string(),
        text_body: "Token de vérification : abc123".to_string(),
    }
}
