//! Verification token message

use std::time::Duration;

use super::email_service::EmailMessage;

/// Subject line used unless configured otherwise
pub const DEFAULT_SUBJECT: &str = "Discord - ULB email adresse vérification";

/// Renders the message carrying a verification token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEmailTemplate {
    subject: String,
    contact_address: String,
    validity_minutes: u64,
}

impl TokenEmailTemplate {
    /// Create a template
    ///
    /// `contact_address` is offered to recipients who did not ask for the
    /// message; `validity` is shown rounded up to whole minutes.
    pub fn new(contact_address: impl Into<String>, validity: Duration) -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            contact_address: contact_address.into(),
            validity_minutes: validity.as_secs().div_ceil(60),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn validity_minutes(&self) -> u64 {
        self.validity_minutes
    }

    /// Build the message for `to` carrying `token`
    pub fn render(&self, to: &str, token: &str) -> EmailMessage {
        let token = escape_html(token);
        let contact = escape_html(&self.contact_address);

        let html_body = format!(
            "<p> Token de vérification : <code>{token}</code> <br><br> \
             Ce token est valable {minutes} minutes. <br><br> \
             Vous recevez ce message car vous avez demandé à lier votre compte Discord \
             avec votre adresse mail ULB afin d'accéder aux serveurs du BEP. <br><br> \
             Si vous n'êtes pas à l'origine de cette demande, ne tenez pas compte de ce mail. <br> \
             Si vous recevez régulièrement ce type de mail par erreur, veuillez nous \
             <a href=\"mailto:{contact}\">contacter</a>.</p>",
            token = token,
            minutes = self.validity_minutes,
            contact = contact,
        );

        let text_body = format!(
            "Token de vérification : {token}\n\n\
             Ce token est valable {minutes} minutes.\n\n\
             Vous recevez ce message car vous avez demandé à lier votre compte Discord \
             avec votre adresse mail ULB afin d'accéder aux serveurs du BEP.\n\n\
             Si vous n'êtes pas à l'origine de cette demande, ne tenez pas compte de ce mail.\n\
             Si vous recevez régulièrement ce type de mail par erreur, contactez {contact}.\n",
            token = token,
            minutes = self.validity_minutes,
            contact = self.contact_address,
        );

        EmailMessage {
            to: to.to_string(),
            subject: self.subject.clone(),
            html_body,
            text_body,
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
