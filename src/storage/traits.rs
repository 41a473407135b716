//! Storage trait definitions

use crate::phenotype::{name_key, IssueNumber, ParseStatusError, Phenotype, PhenotypeId};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Stored status is invalid: {0}")]
    InvalidStatus(#[from] ParseStatusError),

    #[error("Issue {0} is already linked to another phenotype")]
    DuplicateIssue(IssueNumber),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for phenotype storage backends
///
/// Lookups return `Ok(None)` when nothing matches; only I/O failures are
/// errors. Implementations must be thread-safe (Send + Sync) but are not
/// expected to serialize check-then-act sequences; the manager does that.
pub trait PhenotypeStore: Send + Sync {
    /// Insert or update a phenotype.
    ///
    /// Assigns the local id and creation time on first save and refreshes the
    /// modification time on every save. Returns the record as stored.
    fn save_phenotype(&self, phenotype: &Phenotype) -> StorageResult<Phenotype>;

    /// Delete a phenotype by its local id
    fn delete_phenotype(&self, phenotype: &Phenotype) -> StorageResult<bool>;

    /// Load a phenotype by local id
    fn get_phenotype_by_id(&self, id: &PhenotypeId) -> StorageResult<Option<Phenotype>>;

    /// Find a stored phenotype denoting the same request as `candidate`
    ///
    /// See [`Phenotype::is_same_request`]; ties are settled by
    /// [`select_identity_match`].
    fn get_phenotype(&self, candidate: &Phenotype) -> StorageResult<Option<Phenotype>>;

    /// Load the phenotype linked to a tracked issue
    fn get_phenotype_by_issue(&self, number: &IssueNumber) -> StorageResult<Option<Phenotype>>;

    /// Case-insensitive text search over names, synonyms and descriptions
    fn search_phenotypes(&self, text: &str) -> StorageResult<Vec<Phenotype>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: PhenotypeStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}

/// Pick the record an identity lookup resolves to.
///
/// Several stored records can match one candidate because the identity rule
/// is not transitive. A record with the candidate's own local id wins,
/// otherwise the oldest one (by creation time, then id).
pub fn select_identity_match(candidate: &Phenotype, matches: Vec<Phenotype>) -> Option<Phenotype> {
    let mut matches: Vec<Phenotype> = matches
        .into_iter()
        .filter(|stored| stored.is_same_request(candidate))
        .collect();

    if let Some(id) = &candidate.id {
        if let Some(pos) = matches.iter().position(|stored| stored.id.as_ref() == Some(id)) {
            return Some(matches.swap_remove(pos));
        }
    }

    matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    matches.into_iter().next()
}

/// Whether `phenotype` matches a free-text query.
///
/// Query, names and description are all folded with [`name_key`], so every
/// store answers a search the same way.
pub(crate) fn matches_text(phenotype: &Phenotype, text: &str) -> bool {
    let needle = name_key(text);
    if needle.is_empty() {
        return false;
    }
    phenotype.name_keys().iter().any(|key| key.contains(&needle))
        || name_key(&phenotype.description).contains(&needle)
}
