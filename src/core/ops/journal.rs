//! core::ops::journal
//!
//! The on-disk entry journal and batch counters.
//!
//! # Crash Safety Contract
//!
//! 1. **Per-append persistence:** every `append` writes all lines in one
//!    buffer and calls fsync before returning. Store readers hold the shared
//!    lock, so they see a multi-row append whole or not at all; a crash
//!    mid-write leaves a torn final line.
//!
//! 2. **Torn tail recovery:** a final line without its newline terminator is
//!    the remains of an interrupted write. Readers skip it; the next append
//!    truncates it before writing.
//!
//! 3. **Counters are replaced atomically:** `counters.json` is written to a
//!    temp file, fsync'd, and renamed over the old file.
//!
//! # Storage
//!
//! - `<data_dir>/entries.jsonl` - one versioned JSON record per line
//! - `<data_dir>/counters.json` - per-user batch counters
//!
//! # Invariants
//!
//! - Lines are only ever appended; no code path rewrites a complete line
//! - Every mutating call requires a held [`StoreLock`]
//! - `read_all` takes no lock itself; callers hold either lock around it
//!
//! # Usage
//!
//! ```ignore
//! let lock = StoreLock::acquire(&paths)?;
//! let journal = EntryJournal::new(paths.clone());
//! journal.append(&lock, &[stored])?;
//! let all = journal.read_all()?;
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::entry::StoredEntry;
use crate::core::ops::lock::StoreLock;
use crate::core::paths::LedgerPaths;
use crate::core::types::UserId;

/// The kind identifier written on every journal line.
pub const ENTRY_KIND: &str = "beanledger.entry";

/// Current line schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// I/O error reading or writing journal files.
    #[error("journal i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("journal json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A complete line could not be parsed.
    #[error("journal corrupted at line {line}: {message}")]
    Corrupted { line: usize, message: String },

    /// A line was written by an incompatible version.
    #[error("unsupported schema version {found} at line {line}, supported: {SCHEMA_VERSION}")]
    UnsupportedVersion { line: usize, found: u32 },
}

/// Envelope for version dispatch before full parsing.
#[derive(Debug, Deserialize)]
struct LineEnvelope {
    kind: String,
    schema_version: u32,
}

#[derive(Serialize)]
struct LineOut<'a> {
    kind: &'static str,
    schema_version: u32,
    #[serde(flatten)]
    stored: &'a StoredEntry,
}

/// Parse one journal line with version dispatch.
///
/// `line_no` is 1-based and only used for error reporting.
pub fn parse_line(line: &str, line_no: usize) -> Result<StoredEntry, JournalError> {
    let envelope: LineEnvelope =
        serde_json::from_str(line).map_err(|e| JournalError::Corrupted {
            line: line_no,
            message: e.to_string(),
        })?;

    if envelope.kind != ENTRY_KIND {
        return Err(JournalError::Corrupted {
            line: line_no,
            message: format!("invalid kind '{}', expected '{}'", envelope.kind, ENTRY_KIND),
        });
    }

    match envelope.schema_version {
        1 => serde_json::from_str(line).map_err(|e| JournalError::Corrupted {
            line: line_no,
            message: e.to_string(),
        }),
        found => Err(JournalError::UnsupportedVersion {
            line: line_no,
            found,
        }),
    }
}

/// Render one entry as a journal line, newline included.
pub fn render_line(stored: &StoredEntry) -> Result<String, JournalError> {
    let mut line = serde_json::to_string(&LineOut {
        kind: ENTRY_KIND,
        schema_version: SCHEMA_VERSION,
        stored,
    })?;
    line.push('\n');
    Ok(line)
}

/// The append-only entry journal of one data directory.
#[derive(Debug, Clone)]
pub struct EntryJournal {
    paths: LedgerPaths,
}

impl EntryJournal {
    /// Create a journal handle for the given data directory.
    pub fn new(paths: LedgerPaths) -> Self {
        Self { paths }
    }

    /// Append entries in one write, then fsync.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be written to disk. On error
    /// nothing is guaranteed to be visible; a partially written tail is
    /// repaired by the next append.
    pub fn append(&self, _lock: &StoreLock, entries: &[StoredEntry]) -> Result<(), JournalError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut buffer = String::new();
        for stored in entries {
            buffer.push_str(&render_line(stored)?);
        }

        fs::create_dir_all(self.paths.data_dir())?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.paths.entries_path())?;

        repair_torn_tail(&mut file)?;
        file.seek(SeekFrom::End(0))?;
        file.write_all(buffer.as_bytes())?;
        file.sync_all()?;

        Ok(())
    }

    /// Read every complete entry in file order.
    ///
    /// A torn final line is skipped with a warning. Any other unparseable
    /// line is an error.
    pub fn read_all(&self) -> Result<Vec<StoredEntry>, JournalError> {
        let path = self.paths.entries_path();
        if !path.exists() {
            return Ok(vec![]);
        }

        let content = fs::read_to_string(&path)?;
        let complete = content.ends_with('\n') || content.is_empty();
        let lines: Vec<&str> = content.lines().collect();

        let mut entries = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            if !complete && line_no == lines.len() {
                warn!(line = line_no, path = %path.display(), "Skipping torn journal tail");
                break;
            }
            entries.push(parse_line(line, line_no)?);
        }

        Ok(entries)
    }
}

/// Truncate a final line that lacks its newline terminator.
fn repair_torn_tail(file: &mut File) -> Result<(), JournalError> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    file.seek(SeekFrom::Start(0))?;
    let mut content = Vec::with_capacity(len as usize);
    file.read_to_end(&mut content)?;
    let keep = content
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|pos| pos as u64 + 1)
        .unwrap_or(0);

    warn!(
        dropped_bytes = len - keep,
        "Truncating torn journal tail before append"
    );
    file.set_len(keep)?;
    file.sync_all()?;
    Ok(())
}

/// Per-user batch-number counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounters {
    /// Last allocated batch number per user id.
    #[serde(default)]
    pub users: BTreeMap<String, u64>,
}

impl BatchCounters {
    /// Read counters from disk; a missing file is an empty set.
    pub fn read(paths: &LedgerPaths) -> Result<Self, JournalError> {
        let path = paths.counters_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Last allocated batch number for a user.
    pub fn last(&self, user: &UserId) -> u64 {
        self.users.get(user.as_str()).copied().unwrap_or(0)
    }

    /// Allocate the next batch number and persist the counters.
    ///
    /// `floor` is the highest batch number already present in the journal
    /// for this user, so a lost counter file can never hand out a duplicate.
    pub fn allocate(
        paths: &LedgerPaths,
        _lock: &StoreLock,
        user: &UserId,
        floor: u64,
    ) -> Result<u64, JournalError> {
        let mut counters = Self::read(paths)?;
        let next = counters.last(user).max(floor) + 1;
        counters.users.insert(user.as_str().to_string(), next);
        counters.write(paths)?;
        Ok(next)
    }

    /// Write the counters atomically (temp file, fsync, rename).
    fn write(&self, paths: &LedgerPaths) -> Result<(), JournalError> {
        fs::create_dir_all(paths.data_dir())?;
        let path = paths.counters_path();
        let temp_path = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(self)?;
        let mut file = File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::schema::{Consumption, ConsumptionPurpose, EntryPayload};
    use crate::core::entry::LedgerEntry;
    use crate::core::types::{EntityId, EntityType, UtcTimestamp};
    use tempfile::TempDir;

    fn stored(sequence: u64) -> StoredEntry {
        StoredEntry {
            sequence,
            created_at: UtcTimestamp::now(),
            entry: LedgerEntry::new(
                UserId::new("alice").unwrap(),
                EntityType::RoastedCoffee,
                EntityId::new("roasted-1").unwrap(),
                -5.0,
                EntryPayload::Consumption(Consumption {
                    coffee_name: "Kenya AA".into(),
                    amount: 5.0,
                    purpose: ConsumptionPurpose::Manual,
                    notes: None,
                }),
            ),
        }
    }

    fn setup() -> (TempDir, LedgerPaths) {
        let temp = TempDir::new().expect("create temp dir");
        let paths = LedgerPaths::new(temp.path().join("data"));
        (temp, paths)
    }

    mod lines {
        use super::*;

        #[test]
        fn render_then_parse() {
            let entry = stored(1);
            let line = render_line(&entry).unwrap();
            assert!(line.ends_with('\n'));
            assert!(line.contains(ENTRY_KIND));
            assert_eq!(parse_line(line.trim_end(), 1).unwrap(), entry);
        }

        #[test]
        fn wrong_kind_rejected() {
            let line = render_line(&stored(1))
                .unwrap()
                .replace(ENTRY_KIND, "other.kind");
            let err = parse_line(line.trim_end(), 3).unwrap_err();
            assert!(matches!(err, JournalError::Corrupted { line: 3, .. }));
        }

        #[test]
        fn future_version_rejected() {
            let line = render_line(&stored(1))
                .unwrap()
                .replace("\"schema_version\":1", "\"schema_version\":9");
            let err = parse_line(line.trim_end(), 1).unwrap_err();
            assert!(matches!(
                err,
                JournalError::UnsupportedVersion { found: 9, .. }
            ));
        }
    }

    mod journal {
        use super::*;

        #[test]
        fn empty_when_missing() {
            let (_temp, paths) = setup();
            let journal = EntryJournal::new(paths);
            assert!(journal.read_all().unwrap().is_empty());
        }

        #[test]
        fn appends_accumulate_in_order() {
            let (_temp, paths) = setup();
            let lock = StoreLock::acquire(&paths).unwrap();
            let journal = EntryJournal::new(paths);

            journal.append(&lock, &[stored(1)]).unwrap();
            journal.append(&lock, &[stored(2), stored(3)]).unwrap();

            let all = journal.read_all().unwrap();
            let seqs: Vec<u64> = all.iter().map(|e| e.sequence).collect();
            assert_eq!(seqs, vec![1, 2, 3]);
        }

        #[test]
        fn torn_tail_is_skipped_then_repaired() {
            let (_temp, paths) = setup();
            let lock = StoreLock::acquire(&paths).unwrap();
            let journal = EntryJournal::new(paths.clone());
            journal.append(&lock, &[stored(1)]).unwrap();

            // Simulate a crash halfway through the second line
            let half = render_line(&stored(2)).unwrap();
            let mut file = OpenOptions::new()
                .append(true)
                .open(paths.entries_path())
                .unwrap();
            file.write_all(&half.as_bytes()[..half.len() / 2]).unwrap();
            drop(file);

            assert_eq!(journal.read_all().unwrap().len(), 1);

            journal.append(&lock, &[stored(3)]).unwrap();
            let seqs: Vec<u64> = journal
                .read_all()
                .unwrap()
                .iter()
                .map(|e| e.sequence)
                .collect();
            assert_eq!(seqs, vec![1, 3]);
        }

        #[test]
        fn corrupt_complete_line_is_an_error() {
            let (_temp, paths) = setup();
            fs::create_dir_all(paths.data_dir()).unwrap();
            fs::write(paths.entries_path(), "not json\n").unwrap();

            let err = EntryJournal::new(paths).read_all().unwrap_err();
            assert!(matches!(err, JournalError::Corrupted { line: 1, .. }));
        }
    }

    mod counters {
        use super::*;

        #[test]
        fn allocation_is_monotonic_per_user() {
            let (_temp, paths) = setup();
            let lock = StoreLock::acquire(&paths).unwrap();
            let alice = UserId::new("alice").unwrap();
            let bob = UserId::new("bob").unwrap();

            assert_eq!(BatchCounters::allocate(&paths, &lock, &alice, 0).unwrap(), 1);
            assert_eq!(BatchCounters::allocate(&paths, &lock, &alice, 0).unwrap(), 2);
            assert_eq!(BatchCounters::allocate(&paths, &lock, &bob, 0).unwrap(), 1);

            let counters = BatchCounters::read(&paths).unwrap();
            assert_eq!(counters.last(&alice), 2);
            assert_eq!(counters.last(&bob), 1);
        }

        #[test]
        fn floor_prevents_reuse_after_lost_counters() {
            let (_temp, paths) = setup();
            let lock = StoreLock::acquire(&paths).unwrap();
            let alice = UserId::new("alice").unwrap();

            assert_eq!(BatchCounters::allocate(&paths, &lock, &alice, 41).unwrap(), 42);
        }

        #[test]
        fn no_temp_file_left_behind() {
            let (_temp, paths) = setup();
            let lock = StoreLock::acquire(&paths).unwrap();
            let alice = UserId::new("alice").unwrap();
            BatchCounters::allocate(&paths, &lock, &alice, 0).unwrap();

            assert!(paths.counters_path().exists());
            assert!(!paths.counters_path().with_extension("json.tmp").exists());
        }
    }
}
