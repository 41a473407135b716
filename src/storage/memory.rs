//! In-memory storage backend

use super::traits::{matches_text, select_identity_match, PhenotypeStore, StorageError, StorageResult};
use crate::phenotype::{IssueNumber, Phenotype, PhenotypeId};
use chrono::Utc;
use dashmap::DashMap;

/// Phenotype store kept entirely in memory.
///
/// Same semantics as [`SqliteStore`](super::SqliteStore); lookups scan every
/// record, which is fine for tests and short-lived embeddings.
#[derive(Debug, Default)]
pub struct MemoryStore {
    phenotypes: DashMap<PhenotypeId, Phenotype>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.phenotypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phenotypes.is_empty()
    }

    fn snapshot(&self) -> Vec<Phenotype> {
        self.phenotypes.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl PhenotypeStore for MemoryStore {
    fn save_phenotype(&self, phenotype: &Phenotype) -> StorageResult<Phenotype> {
        let now = Utc::now();
        let mut stored = phenotype.clone();
        let id = stored.id.get_or_insert_with(PhenotypeId::generate).clone();
        stored.modified_at = Some(now);

        if let Some(number) = &stored.issue_number {
            let taken = self.phenotypes.iter().any(|entry| {
                entry.key() != &id && entry.value().issue_number.as_ref() == Some(number)
            });
            if taken {
                return Err(StorageError::DuplicateIssue(number.clone()));
            }
        }

        // Creation time sticks to the first save
        if let Some(existing) = self.phenotypes.get(&id) {
            stored.created_at = existing.created_at.or(stored.created_at);
        }
        stored.created_at.get_or_insert(now);

        self.phenotypes.insert(id, stored.clone());
        Ok(stored)
    }

    fn delete_phenotype(&self, phenotype: &Phenotype) -> StorageResult<bool> {
        Ok(phenotype
            .id
            .as_ref()
            .is_some_and(|id| self.phenotypes.remove(id).is_some()))
    }

    fn get_phenotype_by_id(&self, id: &PhenotypeId) -> StorageResult<Option<Phenotype>> {
        Ok(self.phenotypes.get(id).map(|entry| entry.value().clone()))
    }

    fn get_phenotype(&self, candidate: &Phenotype) -> StorageResult<Option<Phenotype>> {
        Ok(select_identity_match(candidate, self.snapshot()))
    }

    fn get_phenotype_by_issue(&self, number: &IssueNumber) -> StorageResult<Option<Phenotype>> {
        Ok(self
            .phenotypes
            .iter()
            .find(|entry| entry.value().issue_number.as_ref() == Some(number))
            .map(|entry| entry.value().clone()))
    }

    fn search_phenotypes(&self, text: &str) -> StorageResult<Vec<Phenotype>> {
        let mut found: Vec<Phenotype> = self
            .snapshot()
            .into_iter()
            .filter(|pt| matches_text(pt, text))
            .collect();
        found.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}
