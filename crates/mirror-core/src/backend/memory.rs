//! In-memory collaborators
//!
//! Deterministic doubles for every collaborator trait. Each is a cheap
//! cloneable handle over shared state, so a test can hand one clone to the
//! engine and keep another to arrange state, inject faults and inspect the
//! outcome.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mirror_fs::NormalizedPath;

use super::{ByteStream, Destination, Ledger, Precheck, Source};
use crate::set::{PathSet, SizedPathSet};
use crate::walker::{Lister, Listing};
use crate::{Error, Result};

const INJECTED: &str = "injected failure";

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build the one-level listing of `dir` from a flat set of file paths.
fn listing_of<'a>(dir: &NormalizedPath, files: impl Iterator<Item = (&'a NormalizedPath, u64)>) -> Listing {
    let mut listing = Listing::new();
    let mut folders = BTreeSet::new();
    for (path, size) in files {
        let Some(rest) = path.strip_prefix(dir) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match rest.split_once('/') {
            Some((folder, _)) => {
                folders.insert(folder.to_string());
            }
            None => {
                listing.files.insert(rest.to_string(), size);
            }
        }
    }
    listing.folders = folders.into_iter().collect();
    listing
}

// ============================================================================
// Source
// ============================================================================

#[derive(Debug, Default)]
struct SourceState {
    files: BTreeMap<NormalizedPath, Vec<u8>>,
    fail_listing: bool,
    fail_read: BTreeSet<NormalizedPath>,
    broken_stream: BTreeSet<NormalizedPath>,
    reads: usize,
    closed: bool,
}

/// Remote tree held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    state: Arc<Mutex<SourceState>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<NormalizedPath>, content: impl Into<Vec<u8>>) -> Self {
        self.put(path, content);
        self
    }

    /// Add or replace a file.
    pub fn put(&self, path: impl Into<NormalizedPath>, content: impl Into<Vec<u8>>) {
        lock(&self.state).files.insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &NormalizedPath) {
        lock(&self.state).files.remove(path);
    }

    /// Make every listing fail.
    pub fn fail_listing(&self) {
        lock(&self.state).fail_listing = true;
    }

    /// Make `read_file` fail for `path`.
    pub fn fail_read_of(&self, path: impl Into<NormalizedPath>) {
        lock(&self.state).fail_read.insert(path.into());
    }

    /// Serve half of `path` and then fail the stream.
    pub fn break_stream_of(&self, path: impl Into<NormalizedPath>) {
        lock(&self.state).broken_stream.insert(path.into());
    }

    /// Number of successful `read_file` calls.
    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

impl Lister for MemorySource {
    fn list(&self, path: &NormalizedPath) -> Result<Listing> {
        let state = lock(&self.state);
        if state.fail_listing {
            return Err(Error::Source {
                path: path.clone(),
                message: INJECTED.into(),
            });
        }
        Ok(listing_of(
            path,
            state.files.iter().map(|(p, c)| (p, c.len() as u64)),
        ))
    }
}

impl Source for MemorySource {
    fn read_file(&self, path: &NormalizedPath) -> Result<ByteStream> {
        let mut state = lock(&self.state);
        if state.fail_read.contains(path) {
            return Err(Error::Source {
                path: path.clone(),
                message: INJECTED.into(),
            });
        }
        let content = state.files.get(path).cloned().ok_or_else(|| Error::Source {
            path: path.clone(),
            message: "no such file".into(),
        })?;
        state.reads += 1;

        if state.broken_stream.contains(path) {
            let half = content.len() / 2;
            return Ok(Box::new(BrokenStream {
                head: io::Cursor::new(content[..half].to_vec()),
            }));
        }
        Ok(Box::new(io::Cursor::new(content)))
    }

    fn close(&self) -> Result<()> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

/// Yields its head, then errors.
struct BrokenStream {
    head: io::Cursor<Vec<u8>>,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.head.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream interrupted")),
            n => Ok(n),
        }
    }
}

// ============================================================================
// Destination
// ============================================================================

#[derive(Debug, Default)]
struct DestinationState {
    files: BTreeMap<NormalizedPath, Vec<u8>>,
    dirs: BTreeSet<NormalizedPath>,
    fail_listing: bool,
    fail_prune: bool,
    fail_write: BTreeSet<NormalizedPath>,
    fail_delete: BTreeSet<NormalizedPath>,
    writes: usize,
    deletes: usize,
    prunes: usize,
}

impl DestinationState {
    fn add_ancestors(&mut self, path: &NormalizedPath) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.is_root() {
                break;
            }
            current = dir.parent();
            self.dirs.insert(dir);
        }
    }
}

/// Local mirror held in memory, tracking directories as well as files.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    state: Arc<Mutex<DestinationState>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<NormalizedPath>, content: impl Into<Vec<u8>>) -> Self {
        self.put(path, content);
        self
    }

    /// Place a file without counting it as a write.
    pub fn put(&self, path: impl Into<NormalizedPath>, content: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut state = lock(&self.state);
        state.add_ancestors(&path);
        state.files.insert(path, content.into());
    }

    /// Create a directory (and its ancestors) with no files in it.
    pub fn mkdir(&self, path: impl Into<NormalizedPath>) {
        let path = path.into();
        let mut state = lock(&self.state);
        state.add_ancestors(&path);
        if !path.is_root() {
            state.dirs.insert(path);
        }
    }

    pub fn content(&self, path: &NormalizedPath) -> Option<Vec<u8>> {
        lock(&self.state).files.get(path).cloned()
    }

    pub fn files(&self) -> Vec<NormalizedPath> {
        lock(&self.state).files.keys().cloned().collect()
    }

    pub fn dirs(&self) -> Vec<NormalizedPath> {
        lock(&self.state).dirs.iter().cloned().collect()
    }

    pub fn fail_listing(&self) {
        lock(&self.state).fail_listing = true;
    }

    pub fn fail_prune(&self) {
        lock(&self.state).fail_prune = true;
    }

    pub fn fail_write_of(&self, path: impl Into<NormalizedPath>) {
        lock(&self.state).fail_write.insert(path.into());
    }

    pub fn fail_delete_of(&self, path: impl Into<NormalizedPath>) {
        lock(&self.state).fail_delete.insert(path.into());
    }

    /// Number of completed writes.
    pub fn writes(&self) -> usize {
        lock(&self.state).writes
    }

    /// Number of completed deletes.
    pub fn deletes(&self) -> usize {
        lock(&self.state).deletes
    }

    pub fn prunes(&self) -> usize {
        lock(&self.state).prunes
    }
}

impl Destination for MemoryDestination {
    fn list_all_files(&self, root: &NormalizedPath) -> Result<SizedPathSet> {
        let state = lock(&self.state);
        if state.fail_listing {
            return Err(Error::Destination {
                path: root.clone(),
                message: INJECTED.into(),
            });
        }
        Ok(state
            .files
            .iter()
            .filter(|(path, _)| path.starts_with(root))
            .map(|(path, content)| (path.clone(), content.len() as u64))
            .collect())
    }

    fn exists(&self, path: &NormalizedPath) -> Result<bool> {
        Ok(lock(&self.state).files.contains_key(path))
    }

    fn delete(&self, path: &NormalizedPath) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_delete.contains(path) {
            return Err(Error::Destination {
                path: path.clone(),
                message: INJECTED.into(),
            });
        }
        if state.files.remove(path).is_none() {
            return Err(Error::Destination {
                path: path.clone(),
                message: "no such file".into(),
            });
        }
        state.deletes += 1;
        Ok(())
    }

    fn write(&self, path: &NormalizedPath, stream: &mut dyn Read) -> Result<u64> {
        if lock(&self.state).fail_write.contains(path) {
            return Err(Error::Destination {
                path: path.clone(),
                message: INJECTED.into(),
            });
        }

        // Buffer fully before publishing so a failed stream leaves nothing behind.
        let mut content = Vec::new();
        stream.read_to_end(&mut content).map_err(|e| Error::Destination {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let written = content.len() as u64;
        let mut state = lock(&self.state);
        state.add_ancestors(path);
        state.files.insert(path.clone(), content);
        state.writes += 1;
        Ok(written)
    }

    fn prune_empty_dirs(&self, root: &NormalizedPath) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_prune {
            return Err(Error::Destination {
                path: root.clone(),
                message: INJECTED.into(),
            });
        }
        state.prunes += 1;

        let DestinationState { files, dirs, .. } = &mut *state;
        dirs.retain(|dir| {
            dir == root || !dir.starts_with(root) || files.keys().any(|f| f.starts_with(dir))
        });
        Ok(())
    }
}

impl Lister for MemoryDestination {
    fn list(&self, path: &NormalizedPath) -> Result<Listing> {
        let state = lock(&self.state);
        let mut listing = listing_of(
            path,
            state.files.iter().map(|(p, c)| (p, c.len() as u64)),
        );
        for dir in &state.dirs {
            if dir.parent().as_ref() == Some(path)
                && let Some(name) = dir.file_name()
                && !listing.folders.iter().any(|f| f == name)
            {
                listing.folders.push(name.to_string());
            }
        }
        listing.folders.sort();
        Ok(listing)
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Default)]
struct LedgerState {
    paths: BTreeSet<NormalizedPath>,
    fail_listing: bool,
    fail_record: BTreeSet<NormalizedPath>,
    fail_delete: BTreeSet<NormalizedPath>,
    records: usize,
}

/// Ledger held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(self, path: impl Into<NormalizedPath>) -> Self {
        self.put(path);
        self
    }

    /// Record a path without counting it as a `record` call.
    pub fn put(&self, path: impl Into<NormalizedPath>) {
        lock(&self.state).paths.insert(path.into());
    }

    pub fn paths(&self) -> Vec<NormalizedPath> {
        lock(&self.state).paths.iter().cloned().collect()
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        lock(&self.state).paths.contains(path)
    }

    /// Number of `record` calls that succeeded.
    pub fn records(&self) -> usize {
        lock(&self.state).records
    }

    pub fn fail_listing(&self) {
        lock(&self.state).fail_listing = true;
    }

    pub fn fail_record_of(&self, path: impl Into<NormalizedPath>) {
        lock(&self.state).fail_record.insert(path.into());
    }

    pub fn fail_delete_of(&self, path: impl Into<NormalizedPath>) {
        lock(&self.state).fail_delete.insert(path.into());
    }
}

impl Ledger for MemoryLedger {
    fn list_all_paths(&self, root: &NormalizedPath) -> Result<PathSet> {
        let state = lock(&self.state);
        if state.fail_listing {
            return Err(Error::LedgerError {
                message: INJECTED.into(),
            });
        }
        Ok(state.paths.iter().filter(|p| p.starts_with(root)).cloned().collect())
    }

    fn exists(&self, path: &NormalizedPath) -> Result<bool> {
        Ok(lock(&self.state).paths.contains(path))
    }

    fn record(&self, path: &NormalizedPath) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_record.contains(path) {
            return Err(Error::LedgerError {
                message: format!("{INJECTED} recording {path}"),
            });
        }
        state.paths.insert(path.clone());
        state.records += 1;
        Ok(())
    }

    fn delete(&self, path: &NormalizedPath) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_delete.contains(path) {
            return Err(Error::LedgerError {
                message: format!("{INJECTED} deleting {path}"),
            });
        }
        state.paths.remove(path);
        Ok(())
    }
}

// ============================================================================
// Precheck
// ============================================================================

#[derive(Debug, Default)]
struct PrecheckState {
    ready: BTreeMap<NormalizedPath, bool>,
    failing: BTreeSet<NormalizedPath>,
    queries: Vec<NormalizedPath>,
}

/// Precheck answering from a fixed table; unknown paths are not ready.
#[derive(Debug, Clone, Default)]
pub struct StaticPrecheck {
    state: Arc<Mutex<PrecheckState>>,
}

impl StaticPrecheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: impl Into<NormalizedPath>, ready: bool) -> Self {
        self.set(path, ready);
        self
    }

    pub fn set(&self, path: impl Into<NormalizedPath>, ready: bool) {
        lock(&self.state).ready.insert(path.into(), ready);
    }

    pub fn fail_for(&self, path: impl Into<NormalizedPath>) {
        lock(&self.state).failing.insert(path.into());
    }

    /// Paths asked about, in order.
    pub fn queries(&self) -> Vec<NormalizedPath> {
        lock(&self.state).queries.clone()
    }
}

impl Precheck for StaticPrecheck {
    fn is_ready(&self, path: &NormalizedPath) -> Result<bool> {
        let mut state = lock(&self.state);
        state.queries.push(path.clone());
        if state.failing.contains(path) {
            return Err(Error::Precheck {
                path: path.clone(),
                message: INJECTED.into(),
            });
        }
        Ok(state.ready.get(path).copied().unwrap_or(false))
    }
}
