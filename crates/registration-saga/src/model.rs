//! Entities written during registration and their store field layout.

use record_store::{Fields, Record, StoreError};
use serde::Serialize;
use serde_json::{json, Value};

/// Collections in a regional tenant store.
pub mod tenant {
    pub const CLIENT: &str = "client";
    pub const DIVISIONS: &str = "divisions";
    pub const USERS: &str = "users";
    pub const PERSONNEL: &str = "personel";
}

/// Collections in the shared master store.
pub mod master {
    pub const CLIENTS: &str = "clients";
    pub const PLANS: &str = "plans";
    pub const REGIONS: &str = "regions";
}

/// Role given to the registering user: client-registrant (owner).
pub const OWNER_ROLE: &str = "cr";

/// Plan field holding the member client ids.
pub const PLAN_MEMBERS_FIELD: &str = "client_json";

/// Serialize an entity into a flat field map.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Json(serde::ser::Error::custom(
            "entity did not serialize to an object",
        ))),
    }
}

/// Tenant record in the regional store.
#[derive(Debug, Clone, Serialize)]
pub struct NewClient {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub paid_modules: Value,
}

impl NewClient {
    /// Paid-modules configuration of a freshly registered tenant.
    pub fn default_paid_modules() -> Value {
        json!({ "modules": [] })
    }
}

/// Sets the owning user once it exists.
#[derive(Debug, Clone, Serialize)]
pub struct ClientManagerPatch {
    pub manager: String,
}

/// Master-store entry pointing a client id back at its regional store.
#[derive(Debug, Clone, Serialize)]
pub struct NewDirectoryEntry {
    pub name: String,
    pub client_id: String,
    pub host: String,
    pub mail_server: String,
    pub region: String,
}

/// Denormalized registrant details on the directory entry.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryOwnerPatch {
    pub owner_name: String,
    pub owner_email: String,
}

/// Default organizational unit under a client.
#[derive(Debug, Clone, Serialize)]
pub struct NewDivision {
    pub name: String,
    pub city: String,
    pub state: String,
    pub client_id: String,
}

/// Credentialed user in the tenant store.
#[derive(Clone, Serialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,
    pub name: String,
    pub phone: String,
    pub client_id: String,
    #[serde(rename = "emailVisibility")]
    pub email_visibility: bool,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .field("phone", &self.phone)
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Links a user to a client with a role.
#[derive(Debug, Clone, Serialize)]
pub struct NewPersonnel {
    pub user: String,
    pub client: String,
    pub role: String,
}

/// Subscription tier shared by many clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: String,
    pub version: String,
    pub name: String,
    pub clients: Vec<String>,
}

impl Plan {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            version: record.version.clone(),
            name: record.str_field("name").unwrap_or_default().to_string(),
            clients: record.str_list(PLAN_MEMBERS_FIELD),
        }
    }

    /// Add a client id, returning `false` if it was already a member.
    pub fn add_member(&mut self, client_id: &str) -> bool {
        if self.clients.iter().any(|c| c == client_id) {
            return false;
        }
        self.clients.push(client_id.to_string());
        true
    }

    /// Patch persisting the membership list.
    pub fn members_patch(&self) -> Fields {
        let mut patch = Fields::new();
        patch.insert(PLAN_MEMBERS_FIELD.into(), json!(self.clients));
        patch
    }
}
