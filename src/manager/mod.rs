//! Reconciliation of phenotype requests across store and tracker

mod engine;
mod locks;


pub use engine::{ManagerOptions, PhenotypeManager, RequesterError, RequesterResult};
pub use locks::{IdentityGuard, IdentityLocks};
