//! Record and filter types shared by every backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flat field map of a record.
pub type Fields = serde_json::Map<String, Value>;

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-generated identifier.
    pub id: String,
    /// Opaque optimistic-concurrency token. Changes on every write.
    pub version: String,
    /// Stored fields, excluding `id` and backend metadata.
    pub fields: Fields,
}

impl Record {
    /// Get a string field.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Get a field as a list of strings, treating a missing or null field as empty.
    pub fn str_list(&self, name: &str) -> Vec<String> {
        match self.fields.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Field-equality filter used for point lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Render as a PocketBase filter expression, e.g. `(name='Acme HOA')`.
    pub fn to_expression(&self) -> String {
        let escaped = self.value.replace('\\', "\\\\").replace('\'', "\\'");
        format!("({}='{}')", self.field, escaped)
    }

    /// Check a field map against this filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        match fields.get(&self.field) {
            Some(Value::String(s)) => s == &self.value,
            Some(other) => other.to_string() == self.value,
            None => false,
        }
    }
}

/// Store operation kinds, used for fault injection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Get,
    Find,
    List,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Find => "find",
            Operation::List => "list",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}
