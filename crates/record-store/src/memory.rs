//! In-memory record store.

use crate::error::StoreError;
use crate::store::RecordStore;
use crate::types::{Fields, Filter, Operation, Record};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// (collection, field) pairs with store-enforced uniqueness.
type UniqueFields = HashSet<(String, String)>;

#[derive(Default)]
struct Inner {
    collections: HashMap<String, HashMap<String, Record>>,
    /// Pending injected failures, consumed on first match
    faults: Vec<(Operation, String)>,
    next_version: u64,
}

impl Inner {
    fn take_fault(&mut self, op: Operation, collection: &str) -> Result<(), StoreError> {
        if let Some(pos) = self
            .faults
            .iter()
            .position(|(o, c)| *o == op && c == collection)
        {
            self.faults.remove(pos);
            debug!(%op, collection, "Injected store failure");
            return Err(StoreError::Unavailable(format!(
                "injected {} failure on {}",
                op, collection
            )));
        }
        Ok(())
    }

    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    /// Reject `fields` if it collides with another record on a unique field.
    fn check_unique(
        &self,
        unique: &UniqueFields,
        collection: &str,
        fields: &Fields,
        except_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let Some(records) = self.collections.get(collection) else {
            return Ok(());
        };

        for (coll, field) in unique {
            if coll != collection {
                continue;
            }
            let Some(value) = fields.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = records
                .values()
                .filter(|r| Some(r.id.as_str()) != except_id)
                .any(|r| r.fields.get(field) == Some(value));
            if taken {
                return Err(StoreError::Conflict(format!(
                    "{}.{} must be unique",
                    collection, field
                )));
            }
        }
        Ok(())
    }

    fn record_mut(&mut self, collection: &str, id: &str) -> Result<&mut Record, StoreError> {
        self.collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    fn apply_patch(
        &mut self,
        unique: &UniqueFields,
        collection: &str,
        id: &str,
        patch: Fields,
    ) -> Result<Record, StoreError> {
        let mut merged = self
            .collections
            .get(collection)
            .and_then(|records| records.get(id))
            .map(|r| r.fields.clone())
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merged.extend(patch);
        self.check_unique(unique, collection, &merged, Some(id))?;

        let version = self.bump_version();
        merged.insert("updated".into(), Value::String(Utc::now().to_rfc3339()));
        let record = self.record_mut(collection, id)?;
        record.fields = merged;
        record.version = version;
        Ok(record.clone())
    }
}

/// In-memory record store.
///
/// Writes are atomic under a single lock, so `update_if_version` is a true
/// compare-and-swap. Intended for tests and local development.
#[derive(Clone)]
pub struct MemoryStore {
    host: String,
    unique: Arc<UniqueFields>,
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store labelled with `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            unique: Arc::new(UniqueFields::new()),
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Enforce uniqueness of `field` within `collection`.
    ///
    /// Constraints belong to the handle: clones taken before this call keep
    /// the set they were cloned with.
    pub fn with_unique(mut self, collection: &str, field: &str) -> Self {
        Arc::make_mut(&mut self.unique).insert((collection.to_string(), field.to_string()));
        self
    }

    /// Make the next `op` on `collection` fail with [`StoreError::Unavailable`].
    pub async fn fail_next(&self, op: Operation, collection: &str) {
        let mut inner = self.inner.write().await;
        inner.faults.push((op, collection.to_string()));
    }

    /// Number of records in a collection.
    pub async fn record_count(&self, collection: &str) -> usize {
        let inner = self.inner.read().await;
        inner.collections.get(collection).map_or(0, HashMap::len)
    }

    /// Insert a record with a known id, bypassing uniqueness checks.
    pub async fn seed(&self, collection: &str, id: &str, fields: Fields) -> Record {
        let mut inner = self.inner.write().await;
        let version = inner.bump_version();
        let record = Record {
            id: id.to_string(),
            version,
            fields,
        };
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record.clone());
        record
    }
}

fn generate_id() -> String {
    let bytes: [u8; 8] = rand::random();
    let mut id = hex::encode(bytes);
    id.truncate(15);
    id
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn host(&self) -> &str {
        &self.host
    }

    #[instrument(skip(self, fields), fields(host = %self.host))]
    async fn create(&self, collection: &str, mut fields: Fields) -> Result<Record, StoreError> {
        let mut inner = self.inner.write().await;
        inner.take_fault(Operation::Create, collection)?;
        inner.check_unique(&self.unique, collection, &fields, None)?;

        let now = Value::String(Utc::now().to_rfc3339());
        fields.insert("created".into(), now.clone());
        fields.insert("updated".into(), now);

        let version = inner.bump_version();
        let record = Record {
            id: generate_id(),
            version,
            fields,
        };
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());

        debug!(id = %record.id, "Created record");
        Ok(record)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Record, StoreError> {
        let mut inner = self.inner.write().await;
        inner.take_fault(Operation::Get, collection)?;
        inner.record_mut(collection, id).map(|r| r.clone())
    }

    async fn find_first(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Record>, StoreError> {
        let mut inner = self.inner.write().await;
        inner.take_fault(Operation::Find, collection)?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|records| records.values().find(|r| filter.matches(&r.fields)))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let mut inner = self.inner.write().await;
        inner.take_fault(Operation::List, collection)?;
        let mut records: Vec<Record> = inner
            .collections
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    #[instrument(skip(self, patch), fields(host = %self.host))]
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
    ) -> Result<Record, StoreError> {
        let mut inner = self.inner.write().await;
        inner.take_fault(Operation::Update, collection)?;
        inner.apply_patch(&self.unique, collection, id, patch)
    }

    #[instrument(skip(self, patch), fields(host = %self.host))]
    async fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: &str,
        patch: Fields,
    ) -> Result<Record, StoreError> {
        let mut inner = self.inner.write().await;
        inner.take_fault(Operation::Update, collection)?;

        let current = inner.record_mut(collection, id)?.version.clone();
        if current != expected_version {
            return Err(StoreError::VersionConflict {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        inner.apply_patch(&self.unique, collection, id, patch)
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.take_fault(Operation::Delete, collection)?;
        inner
            .collections
            .get_mut(collection)
            .and_then(|records| records.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }
}
