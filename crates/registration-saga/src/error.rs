//! Registration errors.

use crate::saga::{RollbackReport, Step};
use record_store::StoreError;
use thiserror::Error;

/// Terminal outcome of a failed registration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Rejected before any write.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate tenant name or email, detected before any write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A precondition lookup failed. Nothing was written.
    #[error("Store lookup failed: {0}")]
    StoreRead(#[source] StoreError),

    /// A write step failed. Earlier steps were rolled back.
    #[error("Registration failed while {step}: {source}")]
    StoreWrite {
        step: Step,
        #[source]
        source: StoreError,
        rollback: RollbackReport,
    },

    /// The welcome email failed and policy required a rollback.
    #[error("Welcome email failed: {message}")]
    Notification {
        message: String,
        rollback: RollbackReport,
    },
}

impl RegistrationError {
    /// Rollback outcome, if any writes had to be undone.
    pub fn rollback(&self) -> Option<&RollbackReport> {
        match self {
            RegistrationError::StoreWrite { rollback, .. }
            | RegistrationError::Notification { rollback, .. } => Some(rollback),
            _ => None,
        }
    }

    /// Message suitable for showing to the registrant.
    pub fn user_message(&self) -> String {
        match self {
            RegistrationError::Validation(msg) => match msg.as_str() {
                "terms not accepted" => "You must agree to the Terms & Conditions.".into(),
                "invalid address" => "Please provide a valid address.".into(),
                "no region" => "Please select a region.".into(),
                "password mismatch" => "Passwords do not match.".into(),
                other => format!("Please check your input ({}).", other),
            },
            RegistrationError::Conflict(msg) => match msg.as_str() {
                "name exists" => "A client with this name is already registered.".into(),
                "email exists" => "An account with this email already exists.".into(),
                other => other.to_string(),
            },
            RegistrationError::StoreRead(_) => {
                "Registration service is temporarily unavailable. No changes were saved.".into()
            }
            RegistrationError::StoreWrite { step, rollback, .. } => {
                failure_message(&format!("Registration failed while {}.", step), rollback)
            }
            RegistrationError::Notification { rollback, .. } => failure_message(
                "We could not send your welcome email, so the registration was cancelled.",
                rollback,
            ),
        }
    }
}

fn failure_message(lead: &str, rollback: &RollbackReport) -> String {
    if rollback.is_clean() {
        format!("{} No changes were saved.", lead)
    } else {
        format!(
            "{} Some records could not be cleaned up; please contact support before retrying.",
            lead
        )
    }
}
