//! Mailer client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail server rejected request: {status} - {message}")]
    Api { status: u16, message: String },
}
