//! Tenant registration across a regional tenant store and the shared master
//! store.
//!
//! [`Registrar::register`] validates a [`RegistrationForm`], then creates the
//! client, directory entry, division, user and personnel records and joins the
//! client to the starter plan. If a write fails, the records created so far
//! are deleted again in reverse order (see [`saga`]).

pub mod error;
pub mod form;
pub mod model;
pub mod notify;
pub mod region;
pub mod registrar;
pub mod saga;

pub use error::RegistrationError;
pub use form::{PostalAddress, RegistrationForm, ValidatedForm};
pub use notify::{LogNotifier, Notifier};
pub use region::{
    PocketBaseStoreFactory, Region, RegionDirectory, StaticStoreFactory, StoreFactory,
};
pub use registrar::{Registrar, RegistrationPolicy, SuccessInfo};
pub use saga::{CompensationError, RollbackReport, Saga, Step, StepError};
