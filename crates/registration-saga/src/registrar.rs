//! Tenant registration: preconditions, write sequence, compensation.

use crate::error::RegistrationError;
use crate::form::{RegistrationForm, ValidatedForm};
use crate::model::{
    master, tenant, to_fields, ClientManagerPatch, DirectoryOwnerPatch, NewClient,
    NewDirectoryEntry, NewDivision, NewPersonnel, NewUser, Plan, OWNER_ROLE,
};
use crate::notify::Notifier;
use crate::region::{Region, RegionDirectory, StoreFactory};
use crate::saga::{delete_record, Saga, StepError, Step};
use mailer_client::WelcomeEmail;
use record_store::{Filter, RecordStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

const INITIAL_PLAN_BACKOFF_MS: u64 = 10;
const MAX_PLAN_BACKOFF_MS: u64 = 200;

/// Tunables of the registration flow.
#[derive(Debug, Clone)]
pub struct RegistrationPolicy {
    /// Name of the plan every new client joins
    pub starter_plan: String,
    pub welcome_subject: String,
    /// Roll the registration back when the welcome email fails
    pub rollback_on_notify_failure: bool,
    /// Retries of the plan membership append after losing a version race
    pub plan_update_retries: u32,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            starter_plan: "Starter".into(),
            welcome_subject: "Welcome to PAF!".into(),
            rollback_on_notify_failure: false,
            plan_update_retries: 5,
        }
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessInfo {
    pub name: String,
    pub email: String,
    pub client_name: String,
    pub client_id: String,
    pub welcome_email_sent: bool,
}

/// Ids of the records a registration wrote.
struct Written {
    client_id: String,
}

/// Orchestrates tenant registration across a regional tenant store and the
/// master store.
pub struct Registrar {
    master: Arc<dyn RecordStore>,
    factory: Arc<dyn StoreFactory>,
    regions: Arc<RegionDirectory>,
    notifier: Arc<dyn Notifier>,
    policy: RegistrationPolicy,
}

impl Registrar {
    pub fn new(
        master: Arc<dyn RecordStore>,
        factory: Arc<dyn StoreFactory>,
        regions: Arc<RegionDirectory>,
        notifier: Arc<dyn Notifier>,
        policy: RegistrationPolicy,
    ) -> Self {
        Self {
            master,
            factory,
            regions,
            notifier,
            policy,
        }
    }

    pub fn regions(&self) -> &RegionDirectory {
        &self.regions
    }

    pub fn policy(&self) -> &RegistrationPolicy {
        &self.policy
    }

    /// Register a new tenant.
    ///
    /// All preconditions are checked before the first write. After that, the
    /// first failing step stops the sequence and the steps already done are
    /// compensated newest-first. Joining the starter plan is never undone.
    #[instrument(skip(self, form), fields(client = %form.company_name, region = %form.region_host))]
    pub async fn register(
        &self,
        form: &RegistrationForm,
    ) -> Result<SuccessInfo, RegistrationError> {
        let validated = form.validate()?;

        let region = self
            .regions
            .resolve(&validated.region_selector)
            .ok_or_else(|| RegistrationError::Validation("no region".into()))?;
        let tenant_store = self.factory.tenant_store(region).await.map_err(|e| {
            warn!(error = %e, "Tenant store for region is not available");
            RegistrationError::Validation("no region".into())
        })?;

        if tenant_store
            .exists(tenant::CLIENT, &Filter::eq("name", &validated.company_name))
            .await
            .map_err(RegistrationError::StoreRead)?
        {
            info!("Client name already registered");
            return Err(RegistrationError::Conflict("name exists".into()));
        }

        if tenant_store
            .exists(tenant::USERS, &Filter::eq("email", &validated.email))
            .await
            .map_err(RegistrationError::StoreRead)?
        {
            info!("Email already registered");
            return Err(RegistrationError::Conflict("email exists".into()));
        }

        if !validated.passwords_match() {
            return Err(RegistrationError::Validation("password mismatch".into()));
        }

        let mut saga = Saga::new("tenant-registration");
        let written = match self
            .write_records(&mut saga, &tenant_store, region, &validated)
            .await
        {
            Ok(written) => written,
            Err(StepError { step, source }) => {
                let rollback = saga.rollback().await;
                warn!(
                    %step,
                    compensated = rollback.compensated.len(),
                    orphaned = rollback.failed.len(),
                    "Registration rolled back"
                );
                return Err(RegistrationError::StoreWrite {
                    step,
                    source,
                    rollback,
                });
            }
        };

        let email = WelcomeEmail {
            mail_server: region.mail_server.clone(),
            client: validated.company_name.clone(),
            to: validated.email.clone(),
            subject: self.policy.welcome_subject.clone(),
            name: validated.name.clone(),
            client_host: tenant_store.host().to_string(),
        };

        let welcome_email_sent = match self.notifier.send_welcome(&email).await {
            Ok(()) => true,
            Err(e) if self.policy.rollback_on_notify_failure => {
                warn!(step = %Step::SendWelcomeEmail, error = %e, "Rolling back registration");
                let rollback = saga.rollback().await;
                return Err(RegistrationError::Notification {
                    message: e.to_string(),
                    rollback,
                });
            }
            Err(e) => {
                warn!(step = %Step::SendWelcomeEmail, error = %e, "Welcome email failed, registration kept");
                false
            }
        };

        info!(client_id = %written.client_id, "Registration complete");

        Ok(SuccessInfo {
            name: validated.name,
            email: validated.email,
            client_name: validated.company_name,
            client_id: written.client_id,
            welcome_email_sent,
        })
    }

    /// Write steps 1 to 8.
    async fn write_records(
        &self,
        saga: &mut Saga,
        tenant_store: &Arc<dyn RecordStore>,
        region: &Region,
        form: &ValidatedForm,
    ) -> Result<Written, StepError> {
        let client = NewClient {
            name: form.company_name.clone(),
            city: form.address.city.clone(),
            state: form.address.state.clone(),
            address: form.address.label.clone(),
            paid_modules: NewClient::default_paid_modules(),
        };
        let client = saga
            .execute_with(
                Step::CreateClient,
                create(tenant_store.as_ref(), tenant::CLIENT, &client),
                |r| delete_record(tenant_store.clone(), tenant::CLIENT, r.id.clone()),
            )
            .await?;

        let entry = NewDirectoryEntry {
            name: form.company_name.clone(),
            client_id: client.id.clone(),
            host: tenant_store.host().to_string(),
            mail_server: region.mail_server.clone(),
            region: region.label.clone(),
        };
        let entry = saga
            .execute_with(
                Step::CreateDirectoryEntry,
                create(self.master.as_ref(), master::CLIENTS, &entry),
                |r| delete_record(self.master.clone(), master::CLIENTS, r.id.clone()),
            )
            .await?;

        let division = NewDivision {
            name: form.division.clone(),
            city: form.address.city.clone(),
            state: form.address.state.clone(),
            client_id: client.id.clone(),
        };
        saga.execute_with(
            Step::CreateDivision,
            create(tenant_store.as_ref(), tenant::DIVISIONS, &division),
            |r| delete_record(tenant_store.clone(), tenant::DIVISIONS, r.id.clone()),
        )
        .await?;

        let user = NewUser {
            email: form.email.clone(),
            password: form.password.clone(),
            password_confirm: form.password_confirm.clone(),
            name: form.name.clone(),
            phone: form.phone.clone(),
            client_id: client.id.clone(),
            email_visibility: true,
        };
        let user = saga
            .execute_with(
                Step::CreateUser,
                create(tenant_store.as_ref(), tenant::USERS, &user),
                |r| delete_record(tenant_store.clone(), tenant::USERS, r.id.clone()),
            )
            .await?;

        let owner = DirectoryOwnerPatch {
            owner_name: form.name.clone(),
            owner_email: form.email.clone(),
        };
        saga.execute(
            Step::PatchDirectoryEntry,
            patch(self.master.as_ref(), master::CLIENTS, &entry.id, &owner),
        )
        .await?;

        let manager = ClientManagerPatch {
            manager: user.id.clone(),
        };
        saga.execute(
            Step::PatchClientManager,
            patch(tenant_store.as_ref(), tenant::CLIENT, &client.id, &manager),
        )
        .await?;

        let personnel = NewPersonnel {
            user: user.id.clone(),
            client: client.id.clone(),
            role: OWNER_ROLE.into(),
        };
        saga.execute_with(
            Step::CreatePersonnel,
            create(tenant_store.as_ref(), tenant::PERSONNEL, &personnel),
            |r| delete_record(tenant_store.clone(), tenant::PERSONNEL, r.id.clone()),
        )
        .await?;

        saga.execute_irreversible(Step::JoinStarterPlan, self.join_starter_plan(&client.id))
            .await?;

        Ok(Written {
            client_id: client.id,
        })
    }

    /// Append a client to the starter plan's membership list.
    ///
    /// The append is a compare-and-swap on the plan's version, retried with
    /// backoff when a concurrent registration updated the plan first.
    async fn join_starter_plan(&self, client_id: &str) -> Result<(), StoreError> {
        let mut backoff_ms = INITIAL_PLAN_BACKOFF_MS;

        for attempt in 0..=self.policy.plan_update_retries {
            if attempt > 0 {
                debug!(attempt, backoff_ms, "Retrying plan membership update");
                sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_PLAN_BACKOFF_MS);
            }

            let record = self
                .master
                .find_first(master::PLANS, &Filter::eq("name", &self.policy.starter_plan))
                .await?
                .ok_or_else(|| StoreError::NotFound {
                    collection: master::PLANS.to_string(),
                    id: self.policy.starter_plan.clone(),
                })?;

            let mut plan = Plan::from_record(&record);
            if !plan.add_member(client_id) {
                return Ok(());
            }

            match self
                .master
                .update_if_version(master::PLANS, &plan.id, &plan.version, plan.members_patch())
                .await
            {
                Ok(_) => {
                    debug!(plan = %plan.name, members = plan.clients.len(), "Joined plan");
                    return Ok(());
                }
                Err(e) if e.is_version_conflict() => continue,
                Err(e) => return Err(e),
            }
        }

        warn!(plan = %self.policy.starter_plan, "Gave up on plan membership update");
        Err(StoreError::VersionConflict {
            collection: master::PLANS.to_string(),
            id: self.policy.starter_plan.clone(),
        })
    }
}

async fn create<T: Serialize>(
    store: &dyn RecordStore,
    collection: &str,
    entity: &T,
) -> Result<record_store::Record, StoreError> {
    store.create(collection, to_fields(entity)?).await
}

async fn patch<T: Serialize>(
    store: &dyn RecordStore,
    collection: &str,
    id: &str,
    entity: &T,
) -> Result<record_store::Record, StoreError> {
    store.update(collection, id, to_fields(entity)?).await
}
