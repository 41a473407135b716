//! The phenotype request record and its merge rules

use super::ids::{IssueNumber, PhenotypeId};
use super::status::{Status, TransitionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Joins an absorbed description onto the existing one.
pub const DESCRIPTION_DELIMITER: char = '\n';

/// Parent reference of a term that has no issue yet
pub const NO_PARENT: &str = "NO PARENT";

/// Canonical display form of a term label.
///
/// Whitespace is trimmed and collapsed, and the label is put in sentence
/// case so that casing variants entered by different users coincide.
/// A first letter whose upper case is several characters (`ß`) is left
/// alone, which keeps the function idempotent.
pub fn canonicalize(raw: &str) -> String {
    let lower = name_key(raw);
    let mut chars = lower.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut upper = first.to_uppercase();
    let head = match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => first,
    };
    std::iter::once(head).chain(chars).collect()
}

/// Key used to compare names under the identity rule
pub fn name_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A request to add a term to the vocabulary.
///
/// The canonical name is never a member of its own synonym set. Review
/// status only moves along the lifecycle in [`Status`], see
/// [`Phenotype::advance_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phenotype {
    /// Local id, absent until first saved
    pub id: Option<PhenotypeId>,
    /// Tracked issue, absent until one has been opened
    pub issue_number: Option<IssueNumber>,
    name: String,
    pub description: String,
    synonyms: BTreeSet<String>,
    /// References to parent terms; not checked for cycles
    pub parents: BTreeSet<String>,
    /// Final vocabulary id, assigned after acceptance
    pub hpo_id: Option<String>,
    status: Status,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Phenotype {
    pub fn new(name: &str, description: impl Into<String>) -> Self {
        Self {
            id: None,
            issue_number: None,
            name: canonicalize(name),
            description: description.into(),
            synonyms: BTreeSet::new(),
            parents: BTreeSet::new(),
            hpo_id: None,
            status: Status::Unsubmitted,
            created_at: None,
            modified_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn synonyms(&self) -> &BTreeSet<String> {
        &self.synonyms
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Restore a persisted status without walking the lifecycle.
    ///
    /// For store adapters rebuilding records from their own rows.
    pub fn restore_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Add a synonym. Returns whether the set changed.
    ///
    /// The canonical name itself is never added.
    pub fn add_synonym(&mut self, synonym: &str) -> bool {
        let synonym = canonicalize(synonym);
        if synonym.is_empty() || name_key(&synonym) == name_key(&self.name) {
            return false;
        }
        self.synonyms.insert(synonym)
    }

    pub fn add_all_synonyms<I, S>(&mut self, synonyms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for synonym in synonyms {
            self.add_synonym(synonym.as_ref());
        }
    }

    pub fn remove_synonym(&mut self, synonym: &str) -> bool {
        self.synonyms.remove(&canonicalize(synonym))
    }

    pub fn add_parent(&mut self, parent: &str) -> bool {
        let parent = parent.trim();
        !parent.is_empty() && self.parents.insert(parent.to_string())
    }

    /// Canonical name followed by the synonyms
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.synonyms.iter().map(String::as_str))
    }

    /// Case-folded keys of every name this request is known by
    pub fn name_keys(&self) -> BTreeSet<String> {
        self.names()
            .map(name_key)
            .filter(|key| !key.is_empty())
            .collect()
    }

    /// Whether both records denote the same real-world request.
    ///
    /// True when both carry the same local id, or when they share at least
    /// one name (canonical name or synonym). Symmetric but not transitive.
    pub fn is_same_request(&self, other: &Phenotype) -> bool {
        if let (Some(a), Some(b)) = (&self.id, &other.id) {
            if a == b {
                return true;
            }
        }
        let ours = self.name_keys();
        other.name_keys().iter().any(|key| ours.contains(key))
    }

    /// Only requests that were never submitted may get a new issue
    pub fn submittable(&self) -> bool {
        self.status == Status::Unsubmitted
    }

    /// Absorb `other` into this record; `other` is left untouched.
    ///
    /// Its name and synonyms become synonyms here and its parents are added.
    /// With `merge_description` its description is appended after ours, even
    /// when the text repeats.
    pub fn merge_with(&mut self, other: &Phenotype, merge_description: bool) {
        self.add_all_synonyms(&other.synonyms);
        self.add_synonym(&other.name);
        self.parents.extend(other.parents.iter().cloned());

        if merge_description && !other.description.trim().is_empty() {
            if self.description.trim().is_empty() {
                self.description = other.description.clone();
            } else {
                self.description.push(DESCRIPTION_DELIMITER);
                self.description.push_str(&other.description);
            }
        }
    }

    /// Become `other`, dropping our own names and description.
    ///
    /// Ids, issue number, vocabulary id and creation time are only taken
    /// from `other` when it has them.
    pub fn replace_by(&mut self, other: &Phenotype) {
        let id = other.id.clone().or_else(|| self.id.take());
        let issue_number = other.issue_number.clone().or_else(|| self.issue_number.take());
        let hpo_id = other.hpo_id.clone().or_else(|| self.hpo_id.take());
        let created_at = other.created_at.or(self.created_at);

        *self = Self {
            id,
            issue_number,
            hpo_id,
            created_at,
            ..other.clone()
        };
    }

    /// Move to an observed review status.
    ///
    /// Walks every intermediate state and returns the transitions applied;
    /// empty when the status is already current.
    pub fn advance_status(&mut self, observed: Status) -> Result<Vec<Status>, TransitionError> {
        let path = self.status.path_to(observed).ok_or(TransitionError {
            from: self.status,
            to: observed,
        })?;
        for step in &path {
            debug_assert!(self.status.can_transition_to(*step));
            self.status = *step;
        }
        Ok(path)
    }

    /// How a child term's issue refers to this one: `#<issue>`, or
    /// [`NO_PARENT`] while no issue is open
    pub fn as_parent(&self) -> String {
        match &self.issue_number {
            Some(number) => format!("#{}", number),
            None => NO_PARENT.to_string(),
        }
    }

    pub fn issue_title(&self) -> String {
        self.name.clone()
    }

    /// Long-form description for the issue tracker
    pub fn issue_body(&self) -> String {
        let synonyms = self.synonyms.iter().cloned().collect::<Vec<_>>().join(",");
        let parents = self.parents.iter().cloned().collect::<Vec<_>>().join(",");
        let id = self.id.as_ref().map(PhenotypeId::as_str).unwrap_or("NONE");
        format!(
            "TERM: {}\nSYNONYMS: {}\nPARENTS: {}\nPT_INTERNAL_ID: {}\nDESCRIPTION: {}",
            self.name,
            synonyms,
            parents,
            id,
            self.description.trim().replace('\n', ". ")
        )
    }
}

impl std::fmt::Display for Phenotype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
