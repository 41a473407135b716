//! Remote issue trackers used for human review of requests

mod memory;
mod traits;

pub use memory::{MemoryTracker, TrackedIssue};
pub use traits::{IssueTracker, TrackerError, TrackerResult};
