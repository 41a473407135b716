//! Review lifecycle of a phenotype request

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Review status of a phenotype request.
///
/// ```text
/// UNSUBMITTED -> SUBMITTED -> REJECTED
///                          -> SYNONYM
///                          -> ACCEPTED -> PUBLISHED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Known locally, never observed as submitted on the tracker
    Unsubmitted,
    /// Issue open and under review
    Submitted,
    Rejected,
    Accepted,
    /// Turned out to be a synonym of an existing term
    Synonym,
    /// Released as part of the canonical vocabulary
    Published,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Unsubmitted,
        Status::Submitted,
        Status::Rejected,
        Status::Accepted,
        Status::Synonym,
        Status::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unsubmitted => "UNSUBMITTED",
            Status::Submitted => "SUBMITTED",
            Status::Rejected => "REJECTED",
            Status::Accepted => "ACCEPTED",
            Status::Synonym => "SYNONYM",
            Status::Published => "PUBLISHED",
        }
    }

    /// Statuses directly reachable from this one
    pub fn successors(&self) -> &'static [Status] {
        match self {
            Status::Unsubmitted => &[Status::Submitted],
            Status::Submitted => &[Status::Rejected, Status::Accepted, Status::Synonym],
            Status::Accepted => &[Status::Published],
            Status::Rejected | Status::Synonym | Status::Published => &[],
        }
    }

    /// No further transition is possible
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Review outcome not yet decided
    pub fn is_in_review(&self) -> bool {
        matches!(self, Status::Unsubmitted | Status::Submitted)
    }

    pub fn can_transition_to(&self, next: Status) -> bool {
        self.successors().contains(&next)
    }

    /// Forward sequence of single-step transitions leading to `target`.
    ///
    /// Empty when `target` is the current status, `None` when it cannot be
    /// reached going forward.
    pub fn path_to(&self, target: Status) -> Option<Vec<Status>> {
        if *self == target {
            return Some(Vec::new());
        }
        self.successors().iter().find_map(|next| {
            next.path_to(target).map(|rest| {
                let mut path = Vec::with_capacity(rest.len() + 1);
                path.push(*next);
                path.extend(rest);
                path
            })
        })
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised status text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// An observed status that cannot be reached from the current one
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal status transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: Status,
    pub to: Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_ends_after_submitted() {
        let in_review: Vec<_> = Status::ALL.into_iter().filter(|s| s.is_in_review()).collect();
        assert_eq!(in_review, vec![Status::Unsubmitted, Status::Submitted]);

        assert!(Status::Rejected.is_terminal());
        assert!(Status::Synonym.is_terminal());
        assert!(Status::Published.is_terminal());
        // Accepted terms still move on to Published.
        assert!(!Status::Accepted.is_terminal());
    }

    #[test]
    fn path_walks_every_intermediate_state() {
        assert_eq!(
            Status::Unsubmitted.path_to(Status::Published),
            Some(vec![Status::Submitted, Status::Accepted, Status::Published])
        );
        assert_eq!(Status::Submitted.path_to(Status::Submitted), Some(vec![]));
    }

    #[test]
    fn backwards_and_sideways_moves_are_unreachable() {
        assert_eq!(Status::Accepted.path_to(Status::Submitted), None);
        assert_eq!(Status::Rejected.path_to(Status::Accepted), None);
        assert_eq!(Status::Synonym.path_to(Status::Published), None);
    }

    #[test]
    fn status_text_round_trips() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>(), Ok(status));
        }
        assert_eq!("accepted".parse::<Status>(), Ok(Status::Accepted));
        assert!("CLOSED".parse::<Status>().is_err());
        assert_eq!(serde_json::to_string(&Status::Synonym).unwrap(), "\"SYNONYM\"");
    }
}
