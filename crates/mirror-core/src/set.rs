//! Path set containers
//!
//! A pass combines three universes of paths. [`PathSet`] carries presence
//! only (the ledger universe); [`SizedPathSet`] also carries byte sizes for
//! the universes where a size comparison matters (remote and local).
//!
//! Set algebra always returns a fresh set and never mutates its operands.

use std::collections::{HashMap, HashSet};

use mirror_fs::NormalizedPath;

/// A set of unique paths. Enumeration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSet {
    inner: HashSet<NormalizedPath>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.inner.contains(path)
    }

    /// Insert a path; returns `false` if it was already present.
    pub fn insert(&mut self, path: NormalizedPath) -> bool {
        self.inner.insert(path)
    }

    /// Remove a path; returns `false` if it was absent.
    pub fn remove(&mut self, path: &NormalizedPath) -> bool {
        self.inner.remove(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NormalizedPath> {
        self.inner.iter()
    }

    /// Every path in `self` or `other`.
    pub fn union(&self, other: &PathSet) -> PathSet {
        self.inner.union(&other.inner).cloned().collect()
    }

    /// Paths in `self` that are not in `other`.
    pub fn difference(&self, other: &PathSet) -> PathSet {
        self.inner.difference(&other.inner).cloned().collect()
    }

    /// Paths present in both sets.
    pub fn intersection(&self, other: &PathSet) -> PathSet {
        self.inner.intersection(&other.inner).cloned().collect()
    }

    /// The paths as an unordered list.
    pub fn to_vec(&self) -> Vec<NormalizedPath> {
        self.inner.iter().cloned().collect()
    }

    /// The paths sorted, for deterministic output.
    pub fn to_sorted_vec(&self) -> Vec<NormalizedPath> {
        let mut paths = self.to_vec();
        paths.sort();
        paths
    }
}

impl FromIterator<NormalizedPath> for PathSet {
    fn from_iter<I: IntoIterator<Item = NormalizedPath>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl Extend<NormalizedPath> for PathSet {
    fn extend<I: IntoIterator<Item = NormalizedPath>>(&mut self, iter: I) {
        self.inner.extend(iter);
    }
}

impl IntoIterator for PathSet {
    type Item = NormalizedPath;
    type IntoIter = std::collections::hash_set::IntoIter<NormalizedPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

/// A mapping from path to size in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizedPathSet {
    inner: HashMap<NormalizedPath, u64>,
}

impl SizedPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Record `size` for `path`, replacing any previous size.
    pub fn set(&mut self, path: NormalizedPath, size: u64) {
        self.inner.insert(path, size);
    }

    /// The size recorded for `path`, if present.
    pub fn get(&self, path: &NormalizedPath) -> Option<u64> {
        self.inner.get(path).copied()
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.inner.contains_key(path)
    }

    pub fn remove(&mut self, path: &NormalizedPath) -> Option<u64> {
        self.inner.remove(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NormalizedPath, u64)> {
        self.inner.iter().map(|(path, size)| (path, *size))
    }

    /// Total of all sizes.
    pub fn total_bytes(&self) -> u64 {
        self.inner.values().sum()
    }

    /// Drop the sizes, keeping only membership.
    pub fn to_path_set(&self) -> PathSet {
        self.inner.keys().cloned().collect()
    }
}

impl FromIterator<(NormalizedPath, u64)> for SizedPathSet {
    fn from_iter<I: IntoIterator<Item = (NormalizedPath, u64)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}
