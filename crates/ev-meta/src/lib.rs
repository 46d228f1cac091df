//! Migration metadata for Evolve.
//!
//! Persists the append-only history of migration attempts and the singleton
//! lock record that serializes migration runs across processes. The SQL
//! mapping works over any [`ev_db::Session`]; the in-memory store backs tests
//! and single-process embedding.

pub mod error;
pub mod memory;
pub mod record;
pub mod sql;
pub mod store;

pub use error::{MetaError, MetaResult};
pub use memory::InMemoryMetadataStore;
pub use record::{LockRecord, MetadataRecord, MIGRATIONS_KEY};
pub use sql::SqlMetadataStore;
pub use store::{LockCoordinator, MetadataStore};
