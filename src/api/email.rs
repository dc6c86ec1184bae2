//! Email delivery abstraction.
//!
//! Auth flows build an [`EmailMessage`] (template name plus a JSON payload with
//! the action link) and hand it to an [`EmailSender`] inline. Template
//! rendering belongs to the sender. The default for local development is
//! [`LogEmailSender`], which logs the message and returns `Ok(())`.

use anyhow::Result;
use serde_json::json;
use tracing::info;

pub const VERIFY_EMAIL_TEMPLATE: &str = "verify_email";
pub const RESET_PASSWORD_TEMPLATE: &str = "reset_password";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

impl EmailMessage {
    #[must_use]
    pub fn verify_email(to_email: &str, base_url: &str, token: &str) -> Self {
        Self::with_link(
            to_email,
            VERIFY_EMAIL_TEMPLATE,
            format!("{base_url}/verify-email?token={token}"),
        )
    }

    #[must_use]
    pub fn reset_password(to_email: &str, base_url: &str, token: &str) -> Self {
        Self::with_link(
            to_email,
            RESET_PASSWORD_TEMPLATE,
            format!("{base_url}/reset-password?token={token}"),
        )
    }

    fn with_link(to_email: &str, template: &str, link: String) -> Self {
        Self {
            to_email: to_email.to_string(),
            template: template.to_string(),
            payload_json: json!({ "link": link }).to_string(),
        }
    }
}

pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_email_links_to_the_app() -> Result<()> {
        let message = EmailMessage::verify_email("ada@example.com", "https://app.test", "tok");
        assert_eq!(message.template, VERIFY_EMAIL_TEMPLATE);
        let payload: serde_json::Value = serde_json::from_str(&message.payload_json)?;
        assert_eq!(payload["link"], "https://app.test/verify-email?token=tok");
        Ok(())
    }

    #[test]
    fn log_sender_never_fails() {
        let message = EmailMessage::reset_password("ada@example.com", "http://localhost", "tok");
        assert!(LogEmailSender.send(&message).is_ok());
    }
}
