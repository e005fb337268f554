//! Outgoing mail seam.
//!
//! The real delivery queue lives outside this service; handlers only need
//! somewhere to hand a message. Failures are logged by callers, never
//! surfaced to the client.

use async_trait::async_trait;
use thiserror::Error;

/// A message handed to the delivery collaborator.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(String),
}

/// Mail delivery interface.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Mailer that only logs. Used in development and wherever no delivery
/// collaborator is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "outgoing mail");
        Ok(())
    }
}
