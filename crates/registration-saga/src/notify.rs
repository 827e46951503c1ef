//! Welcome notification delivery.

use async_trait::async_trait;
use mailer_client::{MailerClient, MailerError, WelcomeEmail};
use tracing::info;

/// Delivers the welcome notification out of band.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_welcome(&self, email: &WelcomeEmail) -> Result<(), MailerError>;
}

#[async_trait]
impl Notifier for MailerClient {
    async fn send_welcome(&self, email: &WelcomeEmail) -> Result<(), MailerError> {
        self.send_welcome_email(email).await
    }
}

/// Notifier that only logs, for running without a mail service.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_welcome(&self, email: &WelcomeEmail) -> Result<(), MailerError> {
        info!(to = %email.to, client = %email.client, "Welcome email (not sent, log only)");
        Ok(())
    }
}
