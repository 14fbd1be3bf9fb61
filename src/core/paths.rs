//! core::paths
//!
//! Centralized path routing for ledger storage locations.
//!
//! # Storage Layout
//!
//! All ledger data lives under one data directory:
//! - `entries.jsonl` - Append-only entry log, one JSON entry per line
//! - `counters.json` - Per-user batch-number counters
//! - `lock` - Exclusive lock file held for every write
//!
//! **Hard rule:** No code outside this module should compute paths inside
//! the data directory.
//!
//! # Example
//!
//! ```
//! use beanledger::core::paths::LedgerPaths;
//! use std::path::PathBuf;
//!
//! let paths = LedgerPaths::new(PathBuf::from("/var/lib/beanledger"));
//!
//! assert_eq!(
//!     paths.entries_path(),
//!     PathBuf::from("/var/lib/beanledger/entries.jsonl")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Directory name used under the platform data directory.
pub const APP_DIR: &str = "beanledger";

/// Centralized path routing for ledger storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPaths {
    /// Root of the ledger's data directory.
    pub data_dir: PathBuf,
}

impl LedgerPaths {
    /// Create paths rooted at the given data directory.
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// The platform default data directory (`$XDG_DATA_HOME/beanledger` on
    /// Linux), if the platform has one.
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(APP_DIR))
    }

    /// The data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to the append-only entry log.
    pub fn entries_path(&self) -> PathBuf {
        self.data_dir.join("entries.jsonl")
    }

    /// Path to the batch-number counter file.
    pub fn counters_path(&self) -> PathBuf {
        self.data_dir.join("counters.json")
    }

    /// Path to the exclusive lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("lock")
    }
}
