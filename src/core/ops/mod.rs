//! core::ops
//!
//! On-disk journaling and locking for the file-backed store.
//!
//! # Modules
//!
//! - [`journal`] - Append-only entry journal and batch counters
//! - [`lock`] - Exclusive and shared data-directory locks
//!
//! # Architecture
//!
//! Every mutating store call:
//! 1. Acquires the exclusive data-directory lock
//! 2. Assigns sequence numbers past the journal's last sequence
//! 3. Appends all lines in one write and fsyncs
//! 4. Releases the lock on drop
//!
//! Store reads hold a shared lock for the duration of the scan.

pub mod journal;
pub mod lock;

pub use journal::{BatchCounters, EntryJournal, JournalError};
pub use lock::{LockError, ReadLock, StoreLock};
