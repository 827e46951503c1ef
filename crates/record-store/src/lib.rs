//! Record-oriented CRUD over named collections.
//!
//! Two backends implement [`RecordStore`]:
//! - [`PocketBaseStore`], talking to a PocketBase instance over REST
//! - [`MemoryStore`], with store-enforced unique fields and fault injection

mod error;
mod memory;
mod pocketbase;
mod store;
mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use pocketbase::PocketBaseStore;
pub use store::RecordStore;
pub use types::*;
