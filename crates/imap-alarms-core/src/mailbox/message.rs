// ── Message types ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mail_builder::MessageBuilder;
use uuid::Uuid;

use super::{Flags, MailboxError};
use crate::model::Uid;

/// Domain part of generated Message-IDs.
const MESSAGE_ID_DOMAIN: &str = "imap-alarms.local";

/// A message ready for delivery.
///
/// Every instance gets a fresh, globally unique Message-ID at
/// construction; it is the only reliable way to find the message again
/// after delivery since the mailbox assigns the UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    message_id: String,
    pub sender_name: String,
    pub sender_address: String,
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
    pub sent_at: DateTime<Utc>,
    pub flags: Flags,
}

impl MailMessage {
    pub fn new(
        sender_name: impl Into<String>,
        sender_address: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id: format!("{}@{MESSAGE_ID_DOMAIN}", Uuid::new_v4()),
            sender_name: sender_name.into(),
            sender_address: sender_address.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            html_body: html_body.into(),
            sent_at,
            flags: Flags::default(),
        }
    }

    /// Set the flags the message is stored with.
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Message-ID without angle brackets.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Render as an RFC 5322 message with an HTML body.
    pub fn to_rfc822(&self) -> Result<Vec<u8>, MailboxError> {
        let bytes = MessageBuilder::new()
            .message_id(self.message_id.as_str())
            .from((self.sender_name.as_str(), self.sender_address.as_str()))
            .to(self.recipient.as_str())
            .subject(self.subject.as_str())
            .date(self.sent_at.timestamp())
            .html_body(self.html_body.as_str())
            .write_to_vec()?;
        Ok(bytes)
    }
}

/// A delivered message as seen through the mailbox.
///
/// Content is shared; cloning only copies the flags and two pointers.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub uid: Uid,
    pub flags: Flags,
    pub internal_date: DateTime<Utc>,
    pub message: Arc<MailMessage>,
    pub raw: Arc<[u8]>,
}

impl StoredMessage {
    pub fn message_id(&self) -> &str {
        self.message.message_id()
    }

    /// Size of the rendered message in bytes.
    pub fn size(&self) -> usize {
        self.raw.len()
    }
}
