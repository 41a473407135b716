//! Storage backends for phenotype requests
//!
//! The manager talks to storage only through the `PhenotypeStore` trait.
//! `SqliteStore` is the persistent implementation; `MemoryStore` keeps
//! everything in process.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{select_identity_match, OpenStore, PhenotypeStore, StorageError, StorageResult};
