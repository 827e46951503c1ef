//! Mail server HTTP client.

use crate::error::MailerError;
use crate::types::WelcomeEmail;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Client for the external email service.
#[derive(Clone)]
pub struct MailerClient {
    client: Client,
    base_url: String,
}

impl MailerClient {
    /// Create a new mailer client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MailerError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check if the mail service is reachable.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Ask the mail service to deliver a welcome email.
    #[instrument(skip(self, email), fields(to = %email.to, mail_server = %email.mail_server))]
    pub async fn send_welcome_email(&self, email: &WelcomeEmail) -> Result<(), MailerError> {
        let response = self
            .client
            .post(format!("{}/send-welcome-email", self.base_url))
            .json(email)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            warn!(status = %status, "Welcome email rejected");
            return Err(MailerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Welcome email accepted");
        Ok(())
    }
}
