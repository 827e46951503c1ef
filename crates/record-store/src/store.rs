//! The record store contract.

use crate::error::StoreError;
use crate::types::{Fields, Filter, Record};
use async_trait::async_trait;

/// Record-oriented CRUD over named collections.
///
/// Every call is an I/O boundary. Implementations must be shareable across
/// requests (`Arc<dyn RecordStore>`).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Connection target of this store (host URL or in-memory label).
    fn host(&self) -> &str;

    /// Create a record and return it with its generated id.
    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError>;

    /// Fetch a record by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Record, StoreError>;

    /// Return the first record matching the filter, if any.
    async fn find_first(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Record>, StoreError>;

    /// List every record of a collection.
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// Merge `patch` into an existing record.
    async fn update(&self, collection: &str, id: &str, patch: Fields)
        -> Result<Record, StoreError>;

    /// Merge `patch` only if the record is still at `expected_version`.
    ///
    /// Fails with [`StoreError::VersionConflict`] otherwise.
    async fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: &str,
        patch: Fields,
    ) -> Result<Record, StoreError>;

    /// Delete a record by id.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Whether a record matching the filter exists.
    async fn exists(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        Ok(self.find_first(collection, filter).await?.is_some())
    }
}
