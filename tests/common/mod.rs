//! Shared adapters for the integration tests
//!
//! Wrappers around the real store and tracker that count calls or fail on
//! demand, so tests can assert on side effects.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use termrequester::{
    IssueNumber, IssueTracker, MemoryTracker, OpenStore, Phenotype, PhenotypeId, PhenotypeManager,
    PhenotypeStore, SqliteStore, Status, StorageError, StorageResult, TrackerError, TrackerResult,
};

/// Store that counts writes and can be switched to fail
pub struct CountingStore<S> {
    inner: S,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl<S: PhenotypeStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk unavailable",
            )));
        }
        Ok(())
    }
}

impl<S: PhenotypeStore> PhenotypeStore for CountingStore<S> {
    fn save_phenotype(&self, phenotype: &Phenotype) -> StorageResult<Phenotype> {
        self.check()?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_phenotype(phenotype)
    }

    fn delete_phenotype(&self, phenotype: &Phenotype) -> StorageResult<bool> {
        self.check()?;
        self.inner.delete_phenotype(phenotype)
    }

    fn get_phenotype_by_id(&self, id: &PhenotypeId) -> StorageResult<Option<Phenotype>> {
        self.check()?;
        self.inner.get_phenotype_by_id(id)
    }

    fn get_phenotype(&self, candidate: &Phenotype) -> StorageResult<Option<Phenotype>> {
        self.check()?;
        self.inner.get_phenotype(candidate)
    }

    fn get_phenotype_by_issue(&self, number: &IssueNumber) -> StorageResult<Option<Phenotype>> {
        self.check()?;
        self.inner.get_phenotype_by_issue(number)
    }

    fn search_phenotypes(&self, text: &str) -> StorageResult<Vec<Phenotype>> {
        self.check()?;
        self.inner.search_phenotypes(text)
    }
}

/// Tracker that counts calls and can be switched to fail
#[derive(Default)]
pub struct CountingTracker {
    pub inner: MemoryTracker,
    opens: AtomicUsize,
    status_calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingTracker {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_status(&self, number: &IssueNumber, status: Status) {
        self.inner.set_status(number, status).unwrap();
    }

    fn check(&self) -> TrackerResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TrackerError::Transport("connection reset".into()));
        }
        Ok(())
    }
}

impl IssueTracker for CountingTracker {
    fn open_issue(&self, phenotype: &Phenotype) -> TrackerResult<IssueNumber> {
        self.check()?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open_issue(phenotype)
    }

    fn patch_issue(&self, phenotype: &Phenotype) -> TrackerResult<()> {
        self.check()?;
        self.inner.patch_issue(phenotype)
    }

    fn search_for_issue(&self, phenotype: &Phenotype) -> TrackerResult<Option<IssueNumber>> {
        self.check()?;
        self.inner.search_for_issue(phenotype)
    }

    fn get_status(&self, phenotype: &Phenotype) -> TrackerResult<Status> {
        self.check()?;
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_status(phenotype)
    }
}

pub struct Harness {
    pub store: Arc<CountingStore<SqliteStore>>,
    pub tracker: Arc<CountingTracker>,
    pub manager: Arc<PhenotypeManager>,
}

/// Manager over an in-memory SQLite store and a counting tracker
pub fn harness() -> Harness {
    let store = Arc::new(CountingStore::new(SqliteStore::open_in_memory().unwrap()));
    let tracker = Arc::new(CountingTracker::default());
    let manager = Arc::new(PhenotypeManager::new(store.clone(), tracker.clone()));
    Harness {
        store,
        tracker,
        manager,
    }
}
