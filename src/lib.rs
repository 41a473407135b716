//! Termrequester: tracking requests for new vocabulary terms
//!
//! Every request for a new phenotype term lives in two places: a local
//! store and a remote issue tracker where curators review it. The
//! [`PhenotypeManager`] keeps the two consistent.
//!
//! # Core Concepts
//!
//! - **Phenotype**: a requested term with synonyms, parents and a review status
//! - **Identity**: two requests are the same if they share a local id or any name
//! - **Reconciliation**: duplicates are merged, each identity gets at most one
//!   issue, and an issue with no local record is reported, never papered over
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use termrequester::{MemoryStore, MemoryTracker, PhenotypeManager};
//!
//! let manager = PhenotypeManager::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryTracker::new()),
//! );
//! let request = manager
//!     .create_request("Microcephaly", &["Small head"], None, Some("Head circumference below -3 SD"))
//!     .unwrap();
//! assert!(request.issue_number.is_some());
//! ```

pub mod config;
mod manager;
mod phenotype;
pub mod storage;
pub mod tracker;

pub use config::{ConfigError, RequesterConfig};
pub use manager::{
    IdentityGuard, IdentityLocks, ManagerOptions, PhenotypeManager, RequesterError,
    RequesterResult,
};
pub use phenotype::{
    canonicalize, name_key, IssueNumber, ParseStatusError, Phenotype, PhenotypeId, Status,
    TransitionError, DESCRIPTION_DELIMITER, LOCAL_ID_PREFIX, NO_PARENT,
};
pub use storage::{MemoryStore, OpenStore, PhenotypeStore, SqliteStore, StorageError, StorageResult};
pub use tracker::{IssueTracker, MemoryTracker, TrackedIssue, TrackerError, TrackerResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
