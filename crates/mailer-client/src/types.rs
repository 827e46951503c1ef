//! Email request payloads.

use serde::{Deserialize, Serialize};

/// Welcome email sent to a newly registered tenant owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeEmail {
    /// Mail server assigned to the tenant's region
    pub mail_server: String,
    /// Tenant name
    pub client: String,
    /// Recipient address
    pub to: String,
    pub subject: String,
    /// Recipient display name
    pub name: String,
    /// Tenant store host, so the mail links to the right region
    pub client_host: String,
}
