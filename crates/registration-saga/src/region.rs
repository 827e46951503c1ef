//! Region directory and per-region tenant store construction.

use crate::model::master;
use async_trait::async_trait;
use record_store::{PocketBaseStore, Record, RecordStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A selectable region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Selector, also the tenant store connection target
    pub value: String,
    /// Human-readable name
    pub label: String,
    /// Mail server assigned to tenants of this region
    pub mail_server: String,
}

impl Region {
    fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            value: record.str_field("value")?.to_string(),
            label: record.str_field("label").unwrap_or_default().to_string(),
            mail_server: record.str_field("mail_server").unwrap_or_default().to_string(),
        })
    }
}

/// Read-only list of regions, fetched once at startup.
#[derive(Debug, Clone, Default)]
pub struct RegionDirectory {
    regions: Vec<Region>,
}

impl RegionDirectory {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Load the `regions` collection from the master store.
    pub async fn load(master_store: &dyn RecordStore) -> Result<Self, StoreError> {
        let records = master_store.list(master::REGIONS).await?;
        let regions: Vec<Region> = records
            .iter()
            .filter_map(|r| {
                let region = Region::from_record(r);
                if region.is_none() {
                    warn!(id = %r.id, "Skipping region record without a value");
                }
                region
            })
            .collect();

        info!("Loaded {} regions", regions.len());
        Ok(Self { regions })
    }

    /// Find the region for a selector.
    pub fn resolve(&self, selector: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.value == selector)
    }

    pub fn list(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Builds the tenant store for a region.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    async fn tenant_store(&self, region: &Region) -> Result<Arc<dyn RecordStore>, StoreError>;
}

/// One PocketBase client per region host, created on first use.
pub struct PocketBaseStoreFactory {
    token: Option<String>,
    timeout: Duration,
    cache: RwLock<HashMap<String, Arc<dyn RecordStore>>>,
}

impl PocketBaseStoreFactory {
    pub fn new(token: Option<String>, timeout: Duration) -> Self {
        Self {
            token,
            timeout,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StoreFactory for PocketBaseStoreFactory {
    async fn tenant_store(&self, region: &Region) -> Result<Arc<dyn RecordStore>, StoreError> {
        if let Some(store) = self.cache.read().await.get(&region.value) {
            return Ok(store.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(store) = cache.get(&region.value) {
            return Ok(store.clone());
        }

        debug!(host = %region.value, "Creating tenant store client");
        let store: Arc<dyn RecordStore> = Arc::new(PocketBaseStore::new(
            region.value.clone(),
            self.token.clone(),
            self.timeout,
        )?);
        cache.insert(region.value.clone(), store.clone());
        Ok(store)
    }
}

/// Fixed host-to-store mapping.
#[derive(Default)]
pub struct StaticStoreFactory {
    stores: HashMap<String, Arc<dyn RecordStore>>,
}

impl StaticStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, host: impl Into<String>, store: Arc<dyn RecordStore>) -> Self {
        self.stores.insert(host.into(), store);
        self
    }
}

#[async_trait]
impl StoreFactory for StaticStoreFactory {
    async fn tenant_store(&self, region: &Region) -> Result<Arc<dyn RecordStore>, StoreError> {
        self.stores
            .get(&region.value)
            .cloned()
            .ok_or_else(|| StoreError::Unavailable(format!("no store for {}", region.value)))
    }
}
