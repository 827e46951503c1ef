//! Shared fixtures for registration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mailer_client::{MailerError, WelcomeEmail};
use record_store::{Fields, Filter, MemoryStore, Record, RecordStore, StoreError};
use registration_saga::model::{master, tenant};
use registration_saga::{
    Notifier, Region, RegionDirectory, Registrar, RegistrationForm, RegistrationPolicy,
    StaticStoreFactory,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const WEST_HOST: &str = "https://west-1.example";

/// Notifier that records what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<WelcomeEmail>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_welcome(&self, email: &WelcomeEmail) -> Result<(), MailerError> {
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

/// Master store whose plan updates always lose the version race.
pub struct ContendedPlanStore {
    inner: MemoryStore,
}

#[async_trait]
impl RecordStore for ContendedPlanStore {
    fn host(&self) -> &str {
        self.inner.host()
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError> {
        self.inner.create(collection, fields).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Record, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn find_first(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Record>, StoreError> {
        self.inner.find_first(collection, filter).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.inner.list(collection).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<Record, StoreError> {
        self.inner.update(collection, id, patch).await
    }

    async fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: &str,
        patch: Fields,
    ) -> Result<Record, StoreError> {
        if collection == master::PLANS {
            return Err(StoreError::VersionConflict {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.inner
            .update_if_version(collection, id, expected_version, patch)
            .await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }
}

/// Stores and registrar wired together for one test.
pub struct Harness {
    pub registrar: Arc<Registrar>,
    pub master: MemoryStore,
    pub tenant: MemoryStore,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_policy(RegistrationPolicy::default()).await
    }

    pub async fn with_policy(policy: RegistrationPolicy) -> Self {
        Self::build(policy, false).await
    }

    /// Harness whose plan membership update never succeeds.
    pub async fn with_contended_plan(policy: RegistrationPolicy) -> Self {
        Self::build(policy, true).await
    }

    async fn build(policy: RegistrationPolicy, contended_plan: bool) -> Self {
        let master = MemoryStore::new("mem://master");
        master
            .seed(
                master::PLANS,
                "starter",
                obj(json!({"name": "Starter", "client_json": []})),
            )
            .await;

        let tenant = MemoryStore::new(WEST_HOST)
            .with_unique(tenant::CLIENT, "name")
            .with_unique(tenant::USERS, "email");

        let regions = RegionDirectory::new(vec![Region {
            value: WEST_HOST.into(),
            label: "West".into(),
            mail_server: "mail-west".into(),
        }]);
        let factory = StaticStoreFactory::new().with_store(WEST_HOST, Arc::new(tenant.clone()));
        let notifier = Arc::new(RecordingNotifier::default());

        let master_store: Arc<dyn RecordStore> = if contended_plan {
            Arc::new(ContendedPlanStore {
                inner: master.clone(),
            })
        } else {
            Arc::new(master.clone())
        };

        let registrar = Registrar::new(
            master_store,
            Arc::new(factory),
            Arc::new(regions),
            notifier.clone(),
            policy,
        );

        Self {
            registrar: Arc::new(registrar),
            master,
            tenant,
            notifier,
        }
    }

    /// Records in every collection the registration writes to.
    pub async fn written_records(&self) -> usize {
        let mut total = self.master.record_count(master::CLIENTS).await;
        for collection in [
            tenant::CLIENT,
            tenant::DIVISIONS,
            tenant::USERS,
            tenant::PERSONNEL,
        ] {
            total += self.tenant.record_count(collection).await;
        }
        total
    }

    pub async fn starter_members(&self) -> Vec<String> {
        self.master
            .get(master::PLANS, "starter")
            .await
            .map(|r| r.str_list("client_json"))
            .unwrap_or_default()
    }
}

pub fn obj(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

/// The "Acme HOA" example registration.
pub fn acme_form() -> RegistrationForm {
    RegistrationForm {
        region_host: WEST_HOST.into(),
        company_name: "Acme HOA".into(),
        division: "Downtown".into(),
        name: "Jane Doe".into(),
        phone: "(555) 123-4567".into(),
        email: "jane@acme.test".into(),
        address: "123 Main St, Springfield, IL".into(),
        password: "Secret123!".into(),
        password_confirm: "Secret123!".into(),
        terms_accepted: true,
    }
}
