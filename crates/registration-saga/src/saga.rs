//! Ordered forward steps with reverse-order compensation.
//!
//! A [`Saga`] records every step that completed. When a later step fails,
//! [`Saga::rollback`] runs the registered compensations newest-first. Each
//! compensation is best-effort: its failure is logged and reported, and the
//! remaining compensations still run.

use futures::future::BoxFuture;
use record_store::{RecordStore, StoreError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Deferred inverse of a completed step.
pub type Compensation = BoxFuture<'static, Result<(), StoreError>>;

/// Steps of a tenant registration, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CreateClient,
    CreateDirectoryEntry,
    CreateDivision,
    CreateUser,
    PatchDirectoryEntry,
    PatchClientManager,
    CreatePersonnel,
    JoinStarterPlan,
    SendWelcomeEmail,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Step::CreateClient => "creating client",
            Step::CreateDirectoryEntry => "creating directory entry",
            Step::CreateDivision => "creating division",
            Step::CreateUser => "creating user",
            Step::PatchDirectoryEntry => "updating directory entry",
            Step::PatchClientManager => "assigning client manager",
            Step::CreatePersonnel => "creating personnel record",
            Step::JoinStarterPlan => "joining starter plan",
            Step::SendWelcomeEmail => "sending welcome email",
        };
        f.write_str(text)
    }
}

/// A forward step failed.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct StepError {
    pub step: Step,
    #[source]
    pub source: StoreError,
}

/// A compensation failed and left an orphaned record behind.
#[derive(Debug, Clone, Error)]
#[error("compensation for {step} failed: {message}")]
pub struct CompensationError {
    pub step: Step,
    pub message: String,
}

/// Outcome of a rollback.
#[derive(Debug, Clone, Default)]
pub struct RollbackReport {
    /// Steps whose compensation succeeded, in the order they ran
    pub compensated: Vec<Step>,
    /// Compensations that failed
    pub failed: Vec<CompensationError>,
    /// Completed steps that have no compensation and stay in effect
    pub uncompensated: Vec<Step>,
}

impl RollbackReport {
    /// Every compensation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Something the saga wrote is still in place.
    pub fn has_residue(&self) -> bool {
        !self.failed.is_empty() || !self.uncompensated.is_empty()
    }
}

enum Undo {
    /// Reverted by compensating a later-created record (patches on records
    /// that get deleted anyway).
    Covered,
    Compensate(Compensation),
    Irreversible,
}

struct Completed {
    step: Step,
    undo: Undo,
}

/// Forward-step log of one saga invocation.
pub struct Saga {
    name: &'static str,
    completed: Vec<Completed>,
}

impl Saga {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            completed: Vec::new(),
        }
    }

    /// Steps completed so far.
    pub fn completed_steps(&self) -> Vec<Step> {
        self.completed.iter().map(|c| c.step).collect()
    }

    async fn run<T, F>(&mut self, step: Step, forward: F) -> Result<T, StepError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match forward.await {
            Ok(value) => {
                debug!(saga = self.name, %step, "Step completed");
                Ok(value)
            }
            Err(source) => {
                warn!(saga = self.name, %step, error = %source, "Step failed");
                Err(StepError { step, source })
            }
        }
    }

    /// Run a step whose effect is undone by compensating another step.
    pub async fn execute<T, F>(&mut self, step: Step, forward: F) -> Result<T, StepError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let value = self.run(step, forward).await?;
        self.completed.push(Completed {
            step,
            undo: Undo::Covered,
        });
        Ok(value)
    }

    /// Run a step and register its compensation, built from the step's output.
    pub async fn execute_with<T, F, C>(
        &mut self,
        step: Step,
        forward: F,
        compensation: C,
    ) -> Result<T, StepError>
    where
        F: Future<Output = Result<T, StoreError>>,
        C: FnOnce(&T) -> Compensation,
    {
        let value = self.run(step, forward).await?;
        self.completed.push(Completed {
            step,
            undo: Undo::Compensate(compensation(&value)),
        });
        Ok(value)
    }

    /// Run a step that cannot be undone. A rollback reports it as
    /// uncompensated.
    pub async fn execute_irreversible<T, F>(
        &mut self,
        step: Step,
        forward: F,
    ) -> Result<T, StepError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let value = self.run(step, forward).await?;
        self.completed.push(Completed {
            step,
            undo: Undo::Irreversible,
        });
        Ok(value)
    }

    /// Compensate every completed step, newest first.
    pub async fn rollback(self) -> RollbackReport {
        let mut report = RollbackReport::default();
        info!(saga = self.name, steps = self.completed.len(), "Rolling back");

        for completed in self.completed.into_iter().rev() {
            let step = completed.step;
            match completed.undo {
                Undo::Covered => {}
                Undo::Irreversible => {
                    warn!(saga = self.name, %step, "Step has no compensation, left in place");
                    report.uncompensated.push(step);
                }
                Undo::Compensate(compensation) => match compensation.await {
                    Ok(()) => {
                        debug!(saga = self.name, %step, "Compensated");
                        report.compensated.push(step);
                    }
                    Err(e) => {
                        error!(saga = self.name, %step, error = %e, "Compensation failed, record orphaned");
                        report.failed.push(CompensationError {
                            step,
                            message: e.to_string(),
                        });
                    }
                },
            }
        }

        report
    }
}

/// Compensation deleting a record created by a step.
pub fn delete_record(
    store: Arc<dyn RecordStore>,
    collection: &'static str,
    id: String,
) -> Compensation {
    Box::pin(async move {
        debug!(collection, %id, host = store.host(), "Deleting record");
        store.delete(collection, &id).await
    })
}
