//! Keyed mutual exclusion for request identities
//!
//! Equivalent requests always share at least one name, so holding every
//! name key of a candidate excludes any concurrent equivalent candidate.
//! Keys are taken all at once, so two callers can never each hold part of
//! what the other is waiting for.

use crate::phenotype::PhenotypeId;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

/// Table of currently held identity keys
#[derive(Debug, Default)]
pub struct IdentityLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock key for a case-folded name
    pub fn name_key(key: &str) -> String {
        format!("name:{}", key)
    }

    /// Lock key for a stored record
    pub fn id_key(id: &PhenotypeId) -> String {
        format!("id:{}", id)
    }

    /// Block until none of `keys` is held, then take all of them.
    ///
    /// The keys are released when the guard drops. A caller holding a guard
    /// may take further keys only if no other caller can be waiting on
    /// those while holding keys of its own.
    pub fn acquire<I, S>(&self, keys: I) -> IdentityGuard<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while keys.iter().any(|key| held.contains(key)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(keys.iter().cloned());

        IdentityGuard { locks: self, keys }
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Releases its keys on drop
#[derive(Debug)]
pub struct IdentityGuard<'a> {
    locks: &'a IdentityLocks,
    keys: Vec<String>,
}

impl IdentityGuard<'_> {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}
