//! Client for the out-of-band email service.

mod client;
mod error;
mod types;

pub use client::MailerClient;
pub use error::MailerError;
pub use types::*;
