//! Durable ledger of synchronized paths
//!
//! The ledger lives in two files. The snapshot (`ledger.toml`) holds a format
//! version and one entry per recorded path, sorted by path. The journal
//! (`ledger.toml.journal`) holds one JSON operation per line, appended by
//! every record or delete since the last compaction. Loading replays the
//! journal over the snapshot.
//!
//! A mutation costs one locked append. Once the journal grows past both the
//! compaction threshold and the number of live entries, it is folded into a
//! fresh snapshot, which keeps the amortized cost of a mutation constant.

mod entry;

pub use entry::LedgerEntry;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use mirror_fs::io::{self, RobustnessConfig};
use mirror_fs::NormalizedPath;
use serde::{Deserialize, Serialize};

use crate::backend::Ledger;
use crate::set::PathSet;
use crate::Result;

/// Current ledger file format version.
pub const LEDGER_VERSION: &str = "1.0";

/// Journal length, in operations, below which compaction never runs.
pub const DEFAULT_COMPACT_AFTER: usize = 1024;

/// On-disk layout of the snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerFile {
    /// Ledger format version for forward compatibility
    version: String,
    #[serde(default)]
    entries: Vec<LedgerEntry>,
}

/// One line of the journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum JournalOp {
    Record(LedgerEntry),
    Delete { path: NormalizedPath },
}

impl JournalOp {
    fn apply(self, entries: &mut Entries) {
        match self {
            Self::Record(entry) => {
                entries.insert(entry.path.clone(), entry);
            }
            Self::Delete { path } => {
                entries.remove(&path);
            }
        }
    }
}

type Entries = BTreeMap<NormalizedPath, LedgerEntry>;

#[derive(Debug, Default)]
struct State {
    entries: Entries,
    /// Journal lines known to this handle: those replayed at load plus its own appends
    journal_lines: usize,
}

/// A [`Ledger`] backed by a TOML snapshot and an append-only journal.
///
/// The in-memory view is loaded at open and follows this handle's own
/// writes. Writes from other handles are visible after a reopen or a
/// compaction, and are never lost: compaction rebuilds from disk.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    journal: PathBuf,
    robustness: RobustnessConfig,
    compact_after: usize,
    state: Mutex<State>,
}

impl FileLedger {
    /// Open the ledger at `path`, loading it under a shared lock.
    ///
    /// A missing snapshot is an empty ledger; it is created on the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be locked, read or
    /// parsed. Unparseable journal lines are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>, robustness: RobustnessConfig) -> Result<Self> {
        let path = path.into();
        let journal = journal_path(&path);
        let state = {
            let _guard = io::lock_shared(&path, robustness)?;
            load(&path, &journal)?
        };
        tracing::debug!(
            path = %path.display(),
            entries = state.entries.len(),
            journal_lines = state.journal_lines,
            "opened ledger"
        );

        Ok(Self {
            path,
            journal,
            robustness,
            compact_after: DEFAULT_COMPACT_AFTER,
            state: Mutex::new(state),
        })
    }

    /// Compact once the journal holds at least `ops` operations (and at least
    /// as many as there are entries).
    pub fn with_compact_after(mut self, ops: usize) -> Self {
        self.compact_after = ops.max(1);
        self
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the journal file.
    pub fn journal_path(&self) -> &Path {
        &self.journal
    }

    /// All entries, sorted by path.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lock().entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Fold the journal into a fresh snapshot and remove it.
    ///
    /// The snapshot is rebuilt from disk, so operations appended by other
    /// handles are kept, and this handle's view is refreshed to match.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken or either file cannot be
    /// read or written.
    pub fn compact(&self) -> Result<()> {
        let mut state = self.lock();
        let _guard = io::lock_exclusive(&self.path, self.robustness)?;
        self.compact_locked(&mut state)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `op` to the journal under an exclusive lock, then apply it.
    fn update(&self, op: JournalOp) -> Result<()> {
        let mut state = self.lock();
        let _guard = io::lock_exclusive(&self.path, self.robustness)?;

        if !self.path.exists() {
            write_snapshot(&self.path, &Entries::new(), self.robustness)?;
        }

        let line = serde_json::to_vec(&op)?;
        io::append_line(&self.journal, &line, self.robustness)?;
        op.apply(&mut state.entries);
        state.journal_lines += 1;

        if state.journal_lines >= self.compact_after.max(state.entries.len()) {
            self.compact_locked(&mut state)?;
        }
        Ok(())
    }

    /// Caller holds the exclusive file lock.
    fn compact_locked(&self, state: &mut State) -> Result<()> {
        let fresh = load(&self.path, &self.journal)?;
        write_snapshot(&self.path, &fresh.entries, self.robustness)?;
        match std::fs::remove_file(&self.journal) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(mirror_fs::Error::io(&self.journal, e).into()),
        }
        tracing::debug!(
            path = %self.path.display(),
            entries = fresh.entries.len(),
            folded = fresh.journal_lines,
            "compacted ledger"
        );

        state.entries = fresh.entries;
        state.journal_lines = 0;
        Ok(())
    }
}

fn journal_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(".journal");
    PathBuf::from(name)
}

fn load(path: &Path, journal: &Path) -> Result<State> {
    let mut state = State {
        entries: read_snapshot(path)?,
        journal_lines: 0,
    };
    if !journal.exists() {
        return Ok(state);
    }

    let content = io::read_text(journal)?;
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        state.journal_lines += 1;
        match serde_json::from_str::<JournalOp>(line) {
            Ok(op) => op.apply(&mut state.entries),
            Err(e) => tracing::warn!(
                path = %journal.display(),
                line = index + 1,
                error = %e,
                "skipping unreadable journal line"
            ),
        }
    }
    Ok(state)
}

fn read_snapshot(path: &Path) -> Result<Entries> {
    if !path.exists() {
        return Ok(Entries::new());
    }
    let content = io::read_text(path)?;
    let file: LedgerFile = toml::from_str(&content)?;
    if file.version != LEDGER_VERSION {
        tracing::warn!(
            path = %path.display(),
            version = %file.version,
            expected = LEDGER_VERSION,
            "ledger written by a different format version"
        );
    }
    Ok(file
        .entries
        .into_iter()
        .map(|entry| (entry.path.clone(), entry))
        .collect())
}

fn write_snapshot(path: &Path, entries: &Entries, robustness: RobustnessConfig) -> Result<()> {
    let file = LedgerFile {
        version: LEDGER_VERSION.to_string(),
        entries: entries.values().cloned().collect(),
    };
    let content = toml::to_string_pretty(&file)?;
    io::write_atomic(path, content.as_bytes(), robustness)?;
    Ok(())
}

impl Ledger for FileLedger {
    fn list_all_paths(&self, root: &NormalizedPath) -> Result<PathSet> {
        Ok(self
            .lock()
            .entries
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect())
    }

    fn exists(&self, path: &NormalizedPath) -> Result<bool> {
        Ok(self.lock().entries.contains_key(path))
    }

    fn record(&self, path: &NormalizedPath) -> Result<()> {
        self.update(JournalOp::Record(LedgerEntry::new(path.clone())))?;
        tracing::debug!(path = %path, "recorded in ledger");
        Ok(())
    }

    fn delete(&self, path: &NormalizedPath) -> Result<()> {
        self.update(JournalOp::Delete { path: path.clone() })?;
        tracing::debug!(path = %path, "removed from ledger");
        Ok(())
    }
}
