//! Outbound mail collaborator.
//!
//! Delivery transport is outside this service; the default implementation
//! records the message in the log so operators can wire up a relay without
//! code changes. Callers treat sending as fire-and-forget and log failures.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ContactMessage {
    /// Village inbox the message is addressed to, from the `contact_email`
    /// setting at submission time.
    pub recipient: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send_contact_message(&self, message: ContactMessage) -> Result<()>;
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_contact_message(&self, message: ContactMessage) -> Result<()> {
        info!(
            recipient = %message.recipient,
            from_name = %message.name,
            from_email = %message.email,
            subject = %message.subject,
            "contact message received"
        );
        Ok(())
    }
}
