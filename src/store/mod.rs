//! store
//!
//! Durable append-only storage for ledger entries.
//!
//! # Design
//!
//! The `EntryStore` trait is async because real backends perform I/O. It has
//! no update or delete method: history can only grow. Every implementation
//! enforces the action/entity compatibility table on insert and assigns each
//! entry its `created_at` and `sequence`.
//!
//! # Implementations
//!
//! - [`memory::MemoryStore`] - In-process store with failure injection
//! - [`file::FileStore`] - JSON-lines journal in a locked data directory
//!
//! # Example
//!
//! ```
//! use beanledger::store::{EntryFilter, EntryStore};
//! use beanledger::store::memory::MemoryStore;
//! use beanledger::core::types::UserId;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let alice = UserId::new("alice").unwrap();
//!
//! let entries = store
//!     .query_by_user(&alice, &EntryFilter::default(), None, 0)
//!     .await
//!     .unwrap();
//! assert!(entries.is_empty());
//! assert_eq!(store.next_batch_number(&alice).await.unwrap(), 1);
//! # });
//! ```

pub mod file;
pub mod filter;
pub mod memory;
pub mod retry;

pub use filter::{EntryFilter, MetadataPredicate, SortOrder};
pub use retry::RetryPolicy;

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::entry::{LedgerEntry, StoredEntry};
use crate::core::ops::{JournalError, LockError};
use crate::core::types::{EntityId, UserId};

/// Errors from store operations.
///
/// Only [`StoreError::Unavailable`] is transient; everything else is
/// surfaced to the caller without retrying.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store could not be reached right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The entry violates a store constraint.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Persisted data could not be read back.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Underlying I/O failed.
    #[error("store i/o error: {0}")]
    Io(String),

    /// Serialization failed.
    #[error("store serialization error: {0}")]
    Json(String),

    /// The store lock could not be taken or released.
    #[error("store lock error: {0}")]
    Lock(String),

    /// A roast with this batch number already exists for the user.
    #[error("batch number {0} is already used")]
    DuplicateBatch(u64),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<JournalError> for StoreError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Io(e) => StoreError::Io(e.to_string()),
            JournalError::Json(e) => StoreError::Json(e.to_string()),
            e @ (JournalError::Corrupted { .. } | JournalError::UnsupportedVersion { .. }) => {
                StoreError::Corrupted(e.to_string())
            }
        }
    }
}

impl From<LockError> for StoreError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::AlreadyLocked => StoreError::Unavailable(err.to_string()),
            other => StoreError::Lock(other.to_string()),
        }
    }
}

/// Highest roast batch number recorded for a user, or 0.
pub(crate) fn highest_batch<'a>(
    entries: impl IntoIterator<Item = &'a StoredEntry>,
    user: &UserId,
) -> u64 {
    entries
        .into_iter()
        .filter(|e| &e.user_id == user)
        .filter_map(|e| e.payload.batch_number())
        .max()
        .unwrap_or(0)
}

/// Reject roasts whose batch number is already taken for their user.
///
/// Covers both the existing entries and earlier entries of the same write.
pub(crate) fn check_batch_unique<'a>(
    existing: impl IntoIterator<Item = &'a StoredEntry>,
    incoming: &[LedgerEntry],
) -> Result<(), StoreError> {
    let mut taken: HashSet<(&UserId, u64)> = existing
        .into_iter()
        .filter_map(|e| e.payload.batch_number().map(|n| (&e.user_id, n)))
        .collect();
    for entry in incoming {
        if let Some(n) = entry.payload.batch_number() {
            if !taken.insert((&entry.user_id, n)) {
                return Err(StoreError::DuplicateBatch(n));
            }
        }
    }
    Ok(())
}

/// Append-only entry storage.
///
/// # Invariants
///
/// - `append` never modifies or removes an existing entry
/// - `query_by_entity` returns entries in canonical `(created_at, sequence)`
///   order, so two calls without intervening appends are identical
/// - `next_batch_number` never returns the same number twice for a user,
///   nor one already carried by a stored roast
/// - no two roasts of one user share a batch number; an append that would
///   break this fails with `DuplicateBatch` and writes nothing
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Backend name for diagnostics (e.g., "memory", "file").
    fn name(&self) -> &'static str;

    /// Whether `append_all` is all-or-nothing.
    fn atomic_batches(&self) -> bool;

    /// Append a single entry.
    ///
    /// # Errors
    ///
    /// - `Constraint` if the action cannot target the entity type, or the
    ///   amount is malformed
    /// - `DuplicateBatch` if a roast reuses one of the user's batch numbers
    /// - `Unavailable` on transient backend failure
    async fn append(&self, entry: LedgerEntry) -> Result<StoredEntry, StoreError>;

    /// Append several entries.
    ///
    /// The default appends one at a time and stops at the first failure,
    /// leaving earlier entries in place. Backends that can do better
    /// override it and report `atomic_batches() == true`.
    async fn append_all(&self, entries: Vec<LedgerEntry>) -> Result<Vec<StoredEntry>, StoreError> {
        let mut stored = Vec::with_capacity(entries.len());
        for entry in entries {
            stored.push(self.append(entry).await?);
        }
        Ok(stored)
    }

    /// Query a user's entries.
    ///
    /// Results are ordered per `filter.order` (descending by default),
    /// then `offset` entries are skipped and at most `limit` returned.
    async fn query_by_user(
        &self,
        user: &UserId,
        filter: &EntryFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<StoredEntry>, StoreError>;

    /// All entries of one entity in ascending canonical order.
    async fn query_by_entity(
        &self,
        user: &UserId,
        entity_id: &EntityId,
    ) -> Result<Vec<StoredEntry>, StoreError>;

    /// Allocate the next roast batch number for a user.
    async fn next_batch_number(&self, user: &UserId) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(StoreError::Unavailable("x".into()).is_transient());
        assert!(!StoreError::Constraint("x".into()).is_transient());
        assert!(!StoreError::Corrupted("x".into()).is_transient());
        assert!(!StoreError::Io("x".into()).is_transient());
        assert!(!StoreError::Json("x".into()).is_transient());
        assert!(!StoreError::Lock("x".into()).is_transient());
        assert!(!StoreError::DuplicateBatch(1).is_transient());
    }

    #[test]
    fn journal_errors_map_to_store_errors() {
        let corrupted = StoreError::from(JournalError::Corrupted {
            line: 3,
            message: "bad".into(),
        });
        assert!(matches!(corrupted, StoreError::Corrupted(ref m) if m.contains("line 3")));

        let version = StoreError::from(JournalError::UnsupportedVersion { line: 1, found: 9 });
        assert!(matches!(version, StoreError::Corrupted(_)));
    }

    #[test]
    fn contended_lock_is_transient() {
        assert!(StoreError::from(LockError::AlreadyLocked).is_transient());
        assert!(!StoreError::from(LockError::AcquireFailed("x".into())).is_transient());
    }
}
