//! core::ops::lock
//!
//! Exclusive and shared locks on a ledger data directory.
//!
//! # Architecture
//!
//! The store lock ensures only one writer touches the entry log and the
//! batch counters at a time, across processes. It is held for every append
//! and every batch-number allocation, which is what makes batch numbers
//! unique.
//!
//! Readers take a [`ReadLock`] on the same file. Readers share it with each
//! other but never overlap a writer, so a multi-row append is seen whole or
//! not at all.
//!
//! Waiting is bounded. A caller that cannot get the lock within the wait
//! gets [`LockError::AlreadyLocked`], which the store reports as a transient
//! failure so the service-level retry takes over.
//!
//! # Storage
//!
//! - `<data_dir>/lock` - Lock file with OS-level exclusive or shared lock
//!
//! # Example
//!
//! ```no_run
//! use beanledger::core::ops::lock::StoreLock;
//! use beanledger::core::paths::LedgerPaths;
//! use std::path::PathBuf;
//!
//! let paths = LedgerPaths::new(PathBuf::from("/tmp/beans"));
//! let lock = StoreLock::acquire(&paths)?;
//!
//! // Append entries while holding the lock
//!
//! drop(lock);
//! # Ok::<(), beanledger::core::ops::lock::LockError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use crate::core::paths::LedgerPaths;

/// How long [`StoreLock::acquire`] waits for another holder.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder kept the lock for the whole wait.
    #[error("ledger is locked by another process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on a ledger data directory.
///
/// Released when dropped.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    file: File,
}

impl StoreLock {
    /// Acquire the lock, waiting up to [`DEFAULT_LOCK_WAIT`].
    ///
    /// Creates the data directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if the wait runs out
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock call fails
    pub fn acquire(paths: &LedgerPaths) -> Result<Self, LockError> {
        Self::acquire_within(paths, DEFAULT_LOCK_WAIT)
    }

    /// Acquire the lock, waiting at most `wait`.
    pub fn acquire_within(paths: &LedgerPaths, wait: Duration) -> Result<Self, LockError> {
        let (path, file) = lock_with(paths, wait, <File as FileExt>::try_lock_exclusive)?;
        Ok(Self { path, file })
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// A shared lock on a ledger data directory, held while reading.
///
/// Released when dropped.
#[derive(Debug)]
pub struct ReadLock {
    file: File,
}

impl ReadLock {
    /// Acquire a shared lock, waiting up to [`DEFAULT_LOCK_WAIT`] for a
    /// writer to finish.
    pub fn acquire(paths: &LedgerPaths) -> Result<Self, LockError> {
        Self::acquire_within(paths, DEFAULT_LOCK_WAIT)
    }

    /// Acquire a shared lock, waiting at most `wait`.
    pub fn acquire_within(paths: &LedgerPaths, wait: Duration) -> Result<Self, LockError> {
        let (_, file) = lock_with(paths, wait, <File as FileExt>::try_lock_shared)?;
        Ok(Self { file })
    }
}

impl Drop for ReadLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Open the lock file and poll `try_lock` until it succeeds or `wait` ends.
fn lock_with(
    paths: &LedgerPaths,
    wait: Duration,
    try_lock: fn(&File) -> io::Result<()>,
) -> Result<(PathBuf, File), LockError> {
    let (path, file) = open(paths)?;
    let deadline = Instant::now() + wait;

    loop {
        match try_lock(&file) {
            Ok(()) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    debug!(path = %path.display(), "gave up waiting for store lock");
                    return Err(LockError::AlreadyLocked);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(LockError::AcquireFailed(e.to_string())),
        }
    }
}

fn open(paths: &LedgerPaths) -> Result<(PathBuf, File), LockError> {
    let data_dir = paths.data_dir();
    fs::create_dir_all(data_dir).map_err(|e| {
        LockError::CreateFailed(format!("cannot create {}: {}", data_dir.display(), e))
    })?;

    let path = paths.lock_path();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e)))?;
    Ok((path, file))
}
