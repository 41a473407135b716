//! Issue tracker trait definitions

use crate::phenotype::{IssueNumber, Phenotype, Status};
use thiserror::Error;

/// Errors that can occur while talking to the issue tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Network or API failure; timeouts surface here too
    #[error("Tracker transport error: {0}")]
    Transport(String),

    #[error("Issue not found: {0}")]
    IssueNotFound(IssueNumber),

    #[error("Phenotype '{0}' has no tracked issue")]
    NotTracked(String),
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Trait for the remote review tracker (e.g. GitHub issues)
///
/// Implementations must be thread-safe (Send + Sync). Opening an issue is
/// not idempotent; the manager opens at most one per resolved identity.
pub trait IssueTracker: Send + Sync {
    /// Open a new issue for `phenotype` and return its number
    fn open_issue(&self, phenotype: &Phenotype) -> TrackerResult<IssueNumber>;

    /// Rewrite the issue of `phenotype` to reflect its current state
    fn patch_issue(&self, phenotype: &Phenotype) -> TrackerResult<()>;

    /// Find an open issue for a request equivalent to `phenotype`
    fn search_for_issue(&self, phenotype: &Phenotype) -> TrackerResult<Option<IssueNumber>>;

    /// Current review status of the issue of `phenotype`
    fn get_status(&self, phenotype: &Phenotype) -> TrackerResult<Status>;

    fn has_issue(&self, phenotype: &Phenotype) -> TrackerResult<bool> {
        Ok(self.search_for_issue(phenotype)?.is_some())
    }
}
