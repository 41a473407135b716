//! PhenotypeManager: reconciles requests between the store and the tracker

use super::locks::{IdentityGuard, IdentityLocks};
use crate::phenotype::{IssueNumber, Phenotype, PhenotypeId, Status};
use crate::storage::{PhenotypeStore, StorageError};
use crate::tracker::{IssueTracker, TrackerError};
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors surfaced by the manager
#[derive(Debug, Error)]
pub enum RequesterError {
    #[error("Store failed during {operation} for '{phenotype}': {source}")]
    StoreIo {
        operation: &'static str,
        phenotype: String,
        #[source]
        source: StorageError,
    },

    #[error("Tracker failed during {operation} for '{phenotype}': {source}")]
    TrackerIo {
        operation: &'static str,
        phenotype: String,
        #[source]
        source: TrackerError,
    },

    /// An open issue exists that no local record refers to. Local data is
    /// presumed lost; needs an operator, not a retry.
    #[error("Issue {issue} for '{phenotype}' is on the tracker but not in the local store")]
    ConsistencyViolation { issue: IssueNumber, phenotype: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RequesterError {
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, RequesterError::ConsistencyViolation { .. })
    }

    /// Whether trying the same call again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            RequesterError::StoreIo { source, .. } => matches!(
                source,
                StorageError::Database(_) | StorageError::Io(_) | StorageError::LockPoisoned
            ),
            RequesterError::TrackerIo { source, .. } => matches!(source, TrackerError::Transport(_)),
            RequesterError::ConsistencyViolation { .. } | RequesterError::InvalidRequest(_) => false,
        }
    }
}

/// Result type for manager operations
pub type RequesterResult<T> = Result<T, RequesterError>;

fn store_error(
    operation: &'static str,
    subject: impl Display,
) -> impl FnOnce(StorageError) -> RequesterError {
    let phenotype = subject.to_string();
    move |source| RequesterError::StoreIo {
        operation,
        phenotype,
        source,
    }
}

fn tracker_error(
    operation: &'static str,
    subject: impl Display,
) -> impl FnOnce(TrackerError) -> RequesterError {
    let phenotype = subject.to_string();
    move |source| RequesterError::TrackerIo {
        operation,
        phenotype,
        source,
    }
}

/// Tunables for the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Append the description of a duplicate request to the existing one
    pub merge_descriptions: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            merge_descriptions: true,
        }
    }
}

/// Ties the local store and the issue tracker together.
///
/// The store is consulted first and decides identity; the tracker is
/// authoritative for review status once an issue exists. Calls for
/// equivalent requests are serialized, so at most one issue is opened per
/// identity. Any adapter failure aborts the call; nothing is retried here.
pub struct PhenotypeManager {
    store: Arc<dyn PhenotypeStore>,
    tracker: Arc<dyn IssueTracker>,
    locks: IdentityLocks,
    options: ManagerOptions,
}

impl PhenotypeManager {
    pub fn new(store: Arc<dyn PhenotypeStore>, tracker: Arc<dyn IssueTracker>) -> Self {
        Self::with_options(store, tracker, ManagerOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn PhenotypeStore>,
        tracker: Arc<dyn IssueTracker>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            store,
            tracker,
            locks: IdentityLocks::new(),
            options,
        }
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Request a new term, or fold the request into an existing one.
    ///
    /// Resolution order:
    /// 1. a local record with the same identity absorbs the request; if it
    ///    was never submitted and has no issue, the missing issue is opened
    /// 2. an open equivalent issue is traced back to its local record, which
    ///    absorbs the request; an issue with no local record is a
    ///    [`RequesterError::ConsistencyViolation`]
    /// 3. otherwise an issue is opened and the request saved
    ///
    /// In step 3 the issue is opened before the record is saved. A crash in
    /// between leaves an issue without a record, which later shows up as a
    /// consistency violation and is fixed by hand.
    pub fn create_request(
        &self,
        name: &str,
        synonyms: &[&str],
        parent: Option<&str>,
        description: Option<&str>,
    ) -> RequesterResult<Phenotype> {
        let mut candidate = Phenotype::new(name, description.unwrap_or_default());
        if candidate.name().is_empty() {
            return Err(RequesterError::InvalidRequest(
                "phenotype name cannot be empty".into(),
            ));
        }
        candidate.add_all_synonyms(synonyms);
        if let Some(parent) = parent {
            let reference = self.resolve_parent(parent)?;
            candidate.add_parent(&reference);
        }

        let _names = self.locks.acquire(
            candidate
                .name_keys()
                .iter()
                .map(|key| IdentityLocks::name_key(key)),
        );

        let local = self
            .store
            .get_phenotype(&candidate)
            .map_err(store_error("get_phenotype", &candidate))?;
        if let Some(existing) = local {
            debug!(phenotype = %candidate, existing = %existing, "request matches local record");
            match self.lock_record(existing)? {
                Some(locked) => return self.absorb(locked, &candidate, true),
                None => debug!(phenotype = %candidate, "matched record was deleted; checking tracker"),
            }
        }

        let remote = self
            .tracker
            .search_for_issue(&candidate)
            .map_err(tracker_error("search_for_issue", &candidate))?;
        if let Some(issue) = remote {
            let linked = self
                .store
                .get_phenotype_by_issue(&issue)
                .map_err(store_error("get_phenotype_by_issue", &candidate))?;
            let locked = match linked {
                Some(existing) => self.lock_record(existing)?,
                None => None,
            };
            let Some(locked) = locked else {
                error!(
                    issue = %issue,
                    phenotype = %candidate,
                    "open issue has no local record; local data presumed lost"
                );
                return Err(RequesterError::ConsistencyViolation {
                    issue,
                    phenotype: candidate.to_string(),
                });
            };
            debug!(phenotype = %candidate, issue = %issue, "request matches tracked issue");
            return self.absorb(locked, &candidate, false);
        }

        let issue = self
            .tracker
            .open_issue(&candidate)
            .map_err(tracker_error("open_issue", &candidate))?;
        info!(phenotype = %candidate, issue = %issue, "opened issue for new request");
        candidate.issue_number = Some(issue);

        self.store
            .save_phenotype(&candidate)
            .map_err(store_error("save_phenotype", &candidate))
    }

    /// Load a record, refreshing its status from the tracker.
    ///
    /// `Ok(None)` when no record has this id. The record is only written back
    /// when the observed status moved it forward.
    pub fn get_phenotype_by_id(&self, id: &PhenotypeId) -> RequesterResult<Option<Phenotype>> {
        let _record = self.locks.acquire([IdentityLocks::id_key(id)]);

        let loaded = self
            .store
            .get_phenotype_by_id(id)
            .map_err(store_error("get_phenotype_by_id", id))?;
        let Some(mut phenotype) = loaded else {
            debug!(id = %id, "no phenotype with this id");
            return Ok(None);
        };
        if phenotype.issue_number.is_none() {
            return Ok(Some(phenotype));
        }

        let observed = self
            .tracker
            .get_status(&phenotype)
            .map_err(tracker_error("get_status", &phenotype))?;
        if !self.apply_observed(&mut phenotype, observed) {
            return Ok(Some(phenotype));
        }

        self.store
            .save_phenotype(&phenotype)
            .map(Some)
            .map_err(store_error("save_phenotype", &phenotype))
    }

    /// Text search over stored requests
    pub fn search(&self, text: &str) -> RequesterResult<Vec<Phenotype>> {
        self.store
            .search_phenotypes(text)
            .map_err(store_error("search_phenotypes", text))
    }

    /// Parent reference recorded for a new request.
    ///
    /// A stored local id becomes that record's `#<issue>` reference while it
    /// has an issue; anything else is kept as an external vocabulary id.
    fn resolve_parent(&self, parent: &str) -> RequesterResult<String> {
        let id = PhenotypeId::from(parent.trim());
        let stored = self
            .store
            .get_phenotype_by_id(&id)
            .map_err(store_error("get_phenotype_by_id", &id))?;
        match stored {
            Some(stored) if stored.issue_number.is_some() => Ok(stored.as_parent()),
            Some(stored) => {
                debug!(parent = %stored, "parent has no issue yet; keeping its local id");
                Ok(id.to_string())
            }
            None => Ok(id.to_string()),
        }
    }

    /// Merge `candidate` into a locked record, persist it and update its issue.
    ///
    /// With `heal`, a never-submitted record is first brought in line with
    /// the tracker.
    fn absorb(
        &self,
        locked: (Phenotype, Option<IdentityGuard<'_>>),
        candidate: &Phenotype,
        heal: bool,
    ) -> RequesterResult<Phenotype> {
        let (mut merged, _record) = locked;
        merged.merge_with(candidate, self.options.merge_descriptions);

        let opened = heal && merged.submittable() && self.heal_drift(&mut merged)?;

        let saved = self
            .store
            .save_phenotype(&merged)
            .map_err(store_error("save_phenotype", &merged))?;

        if saved.issue_number.is_some() && !opened {
            self.tracker
                .patch_issue(&saved)
                .map_err(tracker_error("patch_issue", &saved))?;
        }
        Ok(saved)
    }

    /// Make sure a never-submitted record has an issue. Returns whether one
    /// was opened.
    fn heal_drift(&self, record: &mut Phenotype) -> RequesterResult<bool> {
        if record.issue_number.is_some() {
            match self.tracker.get_status(record) {
                Ok(observed) => {
                    self.apply_observed(record, observed);
                    return Ok(false);
                }
                Err(TrackerError::IssueNotFound(issue)) => {
                    warn!(phenotype = %record, issue = %issue, "linked issue is gone from the tracker");
                    record.issue_number = None;
                }
                Err(source) => {
                    return Err(tracker_error("get_status", &*record)(source));
                }
            }
        }

        let found = self
            .tracker
            .search_for_issue(record)
            .map_err(tracker_error("search_for_issue", &*record))?;
        if let Some(issue) = found {
            let owner = self
                .store
                .get_phenotype_by_issue(&issue)
                .map_err(store_error("get_phenotype_by_issue", &*record))?;
            match owner {
                None => {
                    info!(phenotype = %record, issue = %issue, "linking record to its open issue");
                    record.issue_number = Some(issue);
                }
                Some(owner) => {
                    warn!(
                        phenotype = %record,
                        owner = %owner,
                        issue = %issue,
                        "equivalent open issue belongs to another record; leaving this one without an issue"
                    );
                }
            }
            return Ok(false);
        }

        warn!(phenotype = %record, "unsubmitted record has no issue on the tracker; opening one");
        let issue = self
            .tracker
            .open_issue(record)
            .map_err(tracker_error("open_issue", &*record))?;
        info!(phenotype = %record, issue = %issue, "opened missing issue");
        record.issue_number = Some(issue);
        Ok(true)
    }

    /// Take the record lock and reload the record under it.
    ///
    /// `None` when the record was deleted before the lock was taken.
    fn lock_record(
        &self,
        existing: Phenotype,
    ) -> RequesterResult<Option<(Phenotype, Option<IdentityGuard<'_>>)>> {
        let Some(id) = existing.id.clone() else {
            return Ok(Some((existing, None)));
        };
        let guard = self.locks.acquire([IdentityLocks::id_key(&id)]);

        let fresh = self
            .store
            .get_phenotype_by_id(&id)
            .map_err(store_error("get_phenotype_by_id", &id))?;
        let Some(fresh) = fresh else {
            return Ok(None);
        };
        let mut record = existing;
        record.replace_by(&fresh);
        Ok(Some((record, Some(guard))))
    }

    /// Move `phenotype` to the status seen on the tracker. Returns whether
    /// anything changed.
    fn apply_observed(&self, phenotype: &mut Phenotype, observed: Status) -> bool {
        let previous = phenotype.status();
        match phenotype.advance_status(observed) {
            Ok(steps) if steps.is_empty() => {
                debug!(phenotype = %phenotype, status = %previous, "status unchanged");
                false
            }
            Ok(_) => {
                info!(phenotype = %phenotype, from = %previous, to = %observed, "status advanced");
                true
            }
            Err(err) => {
                warn!(
                    phenotype = %phenotype,
                    error = %err,
                    "tracker status diverges from local record; keeping local status"
                );
                false
            }
        }
    }
}
