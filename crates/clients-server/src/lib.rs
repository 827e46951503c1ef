//! Clients server - self-service tenant registration over HTTP.
//!
//! Exposes the region list and the registration endpoint in front of
//! [`registration_saga::Registrar`], behind a shared API key and a global
//! rate limit.

pub mod api;
pub mod config;
pub mod error;
pub mod stores;

pub use config::Config;
pub use error::ApiError;
pub use stores::Stores;
