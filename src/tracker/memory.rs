//! In-process issue tracker

use super::traits::{IssueTracker, TrackerError, TrackerResult};
use crate::phenotype::{IssueNumber, Phenotype, Status};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// An issue as the tracker sees it
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedIssue {
    pub number: IssueNumber,
    pub title: String,
    pub body: String,
    /// Name keys of the request, used for equivalence search
    pub name_keys: BTreeSet<String>,
    pub status: Status,
}

impl TrackedIssue {
    /// Issues under review are open; decided ones are closed
    pub fn is_open(&self) -> bool {
        self.status == Status::Submitted
    }
}

/// Issue tracker kept in memory, numbering issues from 1.
///
/// New issues start out `SUBMITTED`. Review outcomes are simulated with
/// [`MemoryTracker::set_status`].
#[derive(Debug)]
pub struct MemoryTracker {
    issues: DashMap<u64, TrackedIssue>,
    next_number: AtomicU64,
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self {
            issues: DashMap::new(),
            next_number: AtomicU64::new(1),
        }
    }

    /// Number of issues ever opened
    pub fn opened_count(&self) -> usize {
        self.issues.len()
    }

    pub fn issue(&self, number: &IssueNumber) -> Option<TrackedIssue> {
        let key = Self::key(number).ok()?;
        self.issues.get(&key).map(|entry| entry.value().clone())
    }

    /// All issues, lowest number first
    pub fn issues(&self) -> Vec<TrackedIssue> {
        let mut issues: Vec<(u64, TrackedIssue)> = self
            .issues
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        issues.sort_by_key(|(number, _)| *number);
        issues.into_iter().map(|(_, issue)| issue).collect()
    }

    /// Record a review decision on an issue
    pub fn set_status(&self, number: &IssueNumber, status: Status) -> TrackerResult<()> {
        let key = Self::key(number)?;
        let mut issue = self
            .issues
            .get_mut(&key)
            .ok_or_else(|| TrackerError::IssueNotFound(number.clone()))?;
        issue.status = status;
        Ok(())
    }

    fn key(number: &IssueNumber) -> TrackerResult<u64> {
        number
            .as_str()
            .trim_start_matches('#')
            .parse()
            .map_err(|_| TrackerError::IssueNotFound(number.clone()))
    }

    fn tracked_key(phenotype: &Phenotype) -> TrackerResult<(u64, IssueNumber)> {
        let number = phenotype
            .issue_number
            .clone()
            .ok_or_else(|| TrackerError::NotTracked(phenotype.name().to_string()))?;
        Ok((Self::key(&number)?, number))
    }
}

impl IssueTracker for MemoryTracker {
    fn open_issue(&self, phenotype: &Phenotype) -> TrackerResult<IssueNumber> {
        let key = self.next_number.fetch_add(1, Ordering::SeqCst);
        let number = IssueNumber::from(key);
        self.issues.insert(
            key,
            TrackedIssue {
                number: number.clone(),
                title: phenotype.issue_title(),
                body: phenotype.issue_body(),
                name_keys: phenotype.name_keys(),
                status: Status::Submitted,
            },
        );
        Ok(number)
    }

    fn patch_issue(&self, phenotype: &Phenotype) -> TrackerResult<()> {
        let (key, number) = Self::tracked_key(phenotype)?;
        let mut issue = self
            .issues
            .get_mut(&key)
            .ok_or(TrackerError::IssueNotFound(number))?;
        issue.title = phenotype.issue_title();
        issue.body = phenotype.issue_body();
        issue.name_keys = phenotype.name_keys();
        Ok(())
    }

    fn search_for_issue(&self, phenotype: &Phenotype) -> TrackerResult<Option<IssueNumber>> {
        let keys = phenotype.name_keys();
        Ok(self
            .issues
            .iter()
            .filter(|entry| {
                let issue = entry.value();
                issue.is_open() && issue.name_keys.iter().any(|key| keys.contains(key))
            })
            .map(|entry| *entry.key())
            .min()
            .map(IssueNumber::from))
    }

    fn get_status(&self, phenotype: &Phenotype) -> TrackerResult<Status> {
        let (key, number) = Self::tracked_key(phenotype)?;
        self.issues
            .get(&key)
            .map(|entry| entry.value().status)
            .ok_or(TrackerError::IssueNotFound(number))
    }
}
