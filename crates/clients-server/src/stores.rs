//! Store wiring for the two run modes.

use crate::config::Config;
use anyhow::{Context, Result};
use record_store::{Fields, MemoryStore, PocketBaseStore, RecordStore};
use registration_saga::model::{master, tenant, PLAN_MEMBERS_FIELD};
use registration_saga::{PocketBaseStoreFactory, StaticStoreFactory, StoreFactory};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Tenant store host of the in-memory demo region.
pub const DEMO_REGION_HOST: &str = "mem://demo";

/// Master store and tenant store factory.
pub struct Stores {
    pub master: Arc<dyn RecordStore>,
    pub factory: Arc<dyn StoreFactory>,
}

impl Stores {
    /// Build the stores selected by `master.in_memory`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        if config.master.in_memory {
            info!("In-memory mode, seeding demo region and plan");
            return Ok(Self::demo().await);
        }

        let master = PocketBaseStore::new(
            &config.master.url,
            config.master.admin_token.clone(),
            config.master.timeout,
        )
        .context("Failed to create master store client")?;

        if !master.health_check().await {
            anyhow::bail!("Master store at {} is not reachable", config.master.url);
        }

        Ok(Self {
            master: Arc::new(master),
            factory: Arc::new(PocketBaseStoreFactory::new(
                config.tenant.admin_token.clone(),
                config.tenant.timeout,
            )),
        })
    }

    /// In-memory master and tenant stores with one region and an empty
    /// Starter plan.
    pub async fn demo() -> Self {
        let master = MemoryStore::new("mem://master");
        master
            .seed(
                master::REGIONS,
                "demo",
                fields(json!({
                    "value": DEMO_REGION_HOST,
                    "label": "Demo",
                    "mail_server": "mail-demo",
                })),
            )
            .await;
        let mut plan = fields(json!({ "name": "Starter" }));
        plan.insert(PLAN_MEMBERS_FIELD.into(), json!([]));
        master.seed(master::PLANS, "starter", plan).await;

        let tenant_store = MemoryStore::new(DEMO_REGION_HOST)
            .with_unique(tenant::CLIENT, "name")
            .with_unique(tenant::USERS, "email");

        Self {
            master: Arc::new(master),
            factory: Arc::new(
                StaticStoreFactory::new().with_store(DEMO_REGION_HOST, Arc::new(tenant_store)),
            ),
        }
    }
}

fn fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Fields::new(),
    }
}
