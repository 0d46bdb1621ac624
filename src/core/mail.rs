//! Outbound mail seam
//!
//! Closing a period mails the archived invoice to the user, and the session
//! provider mails verification links. Delivery itself lives outside this
//! crate; [`LogMailSender`] only records what would have been sent.

use super::error::Result;
use async_trait::async_trait;

/// A file attached to a mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

impl Attachment {
    pub fn new(bytes: Vec<u8>, mime_type: &str, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.to_string(),
            filename: filename.into(),
        }
    }
}

/// A mail addressed to the configured sender/recipient
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Trait for mail transports
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver a message, failing with [`HightechError::Upstream`](super::error::HightechError::Upstream)
    async fn send(&self, message: MailMessage) -> Result<()>;
}

/// Mail sender that logs messages instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogMailSender {
    address: String,
}

impl LogMailSender {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, message: MailMessage) -> Result<()> {
        let attachments: Vec<&str> = message
            .attachments
            .iter()
            .map(|a| a.filename.as_str())
            .collect();

        tracing::info!(
            to = %self.address,
            subject = %message.subject,
            attachments = ?attachments,
            "mail not delivered, logging only"
        );
        tracing::debug!(body = %message.body, "mail body");

        Ok(())
    }
}
