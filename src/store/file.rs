//! store::file
//!
//! Entry store backed by a data directory on the local filesystem.
//!
//! # Storage
//!
//! See [`crate::core::paths`] for the layout. Entries are appended to the
//! JSON-lines journal; batch numbers are kept in `counters.json`.
//!
//! # Concurrency
//!
//! Every write and every batch allocation holds the exclusive data-directory
//! lock, so several processes can share one ledger. Batch-number uniqueness
//! is checked against the journal under that lock. Queries hold the shared
//! lock while they scan, so they never see part of a multi-entry append.
//! Blocking file I/O runs on tokio's blocking pool.
//!
//! # Example
//!
//! ```no_run
//! use beanledger::store::file::FileStore;
//! use beanledger::store::EntryStore;
//! use beanledger::core::types::UserId;
//! use std::path::PathBuf;
//!
//! # tokio_test::block_on(async {
//! let store = FileStore::open(PathBuf::from("/tmp/beans"));
//! let batch = store.next_batch_number(&UserId::new("alice").unwrap()).await.unwrap();
//! assert!(batch >= 1);
//! # });
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::filter::{select, EntryFilter};
use super::{check_batch_unique, highest_batch, EntryStore, StoreError};
use crate::core::entry::{LedgerEntry, StoredEntry};
use crate::core::ops::{BatchCounters, EntryJournal, ReadLock, StoreLock};
use crate::core::paths::LedgerPaths;
use crate::core::types::{EntityId, UserId, UtcTimestamp};

/// File-backed entry store.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: LedgerPaths,
}

impl FileStore {
    /// Open a store rooted at `data_dir`.
    ///
    /// Nothing is created until the first write.
    pub fn open(data_dir: PathBuf) -> Self {
        Self {
            paths: LedgerPaths::new(data_dir),
        }
    }

    /// The store's paths.
    pub fn paths(&self) -> &LedgerPaths {
        &self.paths
    }

    /// Run blocking work on the blocking pool.
    async fn blocking<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(LedgerPaths) -> Result<T, StoreError> + Send + 'static,
    {
        let paths = self.paths.clone();
        tokio::task::spawn_blocking(move || work(paths))
            .await
            .map_err(|e| StoreError::Io(format!("store task failed: {}", e)))?
    }
}

/// Read the journal under the shared lock.
///
/// A ledger that has never been written is empty and needs no lock.
fn read_locked(paths: &LedgerPaths) -> Result<Vec<StoredEntry>, StoreError> {
    if !paths.entries_path().exists() {
        return Ok(vec![]);
    }
    let _lock = ReadLock::acquire(paths)?;
    Ok(EntryJournal::new(paths.clone()).read_all()?)
}

/// Validate and append entries under the store lock.
fn append_locked(
    paths: &LedgerPaths,
    entries: Vec<LedgerEntry>,
) -> Result<Vec<StoredEntry>, StoreError> {
    for entry in &entries {
        entry.check_constraints().map_err(StoreError::Constraint)?;
    }

    let lock = StoreLock::acquire(paths)?;
    let journal = EntryJournal::new(paths.clone());
    let existing = journal.read_all()?;
    check_batch_unique(&existing, &entries)?;

    let mut sequence = existing.iter().map(|e| e.sequence).max().unwrap_or(0);
    let now = UtcTimestamp::now();
    let created_at = existing
        .iter()
        .map(|e| e.created_at)
        .max()
        .filter(|last| *last > now)
        .unwrap_or(now);

    let stored: Vec<StoredEntry> = entries
        .into_iter()
        .map(|entry| {
            sequence += 1;
            debug!(
                sequence,
                action = %entry.action_type(),
                entity = %entry.entity_id,
                "Appending entry"
            );
            StoredEntry {
                sequence,
                created_at,
                entry,
            }
        })
        .collect();

    journal.append(&lock, &stored)?;
    Ok(stored)
}

#[async_trait]
impl EntryStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn atomic_batches(&self) -> bool {
        true
    }

    async fn append(&self, entry: LedgerEntry) -> Result<StoredEntry, StoreError> {
        let mut stored = self
            .blocking(move |paths| append_locked(&paths, vec![entry]))
            .await?;
        stored
            .pop()
            .ok_or_else(|| StoreError::Io("append produced no entry".to_string()))
    }

    async fn append_all(&self, entries: Vec<LedgerEntry>) -> Result<Vec<StoredEntry>, StoreError> {
        self.blocking(move |paths| append_locked(&paths, entries))
            .await
    }

    async fn query_by_user(
        &self,
        user: &UserId,
        filter: &EntryFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        let user = user.clone();
        let filter = filter.clone();
        self.blocking(move |paths| {
            let entries = read_locked(&paths)?;
            Ok(select(entries.iter(), &user, &filter, limit, offset))
        })
        .await
    }

    async fn query_by_entity(
        &self,
        user: &UserId,
        entity_id: &EntityId,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        let user = user.clone();
        let entity_id = entity_id.clone();
        self.blocking(move |paths| {
            let mut entries: Vec<StoredEntry> = read_locked(&paths)?
                .into_iter()
                .filter(|e| e.user_id == user && e.entity_id == entity_id)
                .collect();
            entries.sort_by_key(|e| e.order_key());
            Ok(entries)
        })
        .await
    }

    async fn next_batch_number(&self, user: &UserId) -> Result<u64, StoreError> {
        let user = user.clone();
        self.blocking(move |paths| {
            let lock = StoreLock::acquire(&paths)?;
            let entries = EntryJournal::new(paths.clone()).read_all()?;
            let floor = highest_batch(&entries, &user);
            Ok(BatchCounters::allocate(&paths, &lock, &user, floor)?)
        })
        .await
    }
}
