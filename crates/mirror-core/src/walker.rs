//! Hierarchical-to-flat walker
//!
//! Turns any [`Lister`] into one flat [`SizedPathSet`] covering the subtree
//! below a starting path. Traversal is breadth-first over an explicit
//! [`BoundedQueue`], never the call stack, so memory stays bounded by the
//! queue capacity.

use std::collections::BTreeMap;

use mirror_fs::NormalizedPath;

use crate::queue::{BoundedQueue, DEFAULT_CAPACITY};
use crate::set::SizedPathSet;
use crate::{Error, Result};

/// One directory level as reported by a [`Lister`].
///
/// Entries are bare names relative to the listed directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub files: BTreeMap<String, u64>,
    pub folders: Vec<String>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, size: u64) -> Self {
        self.files.insert(name.into(), size);
        self
    }

    pub fn with_folder(mut self, name: impl Into<String>) -> Self {
        self.folders.push(name.into());
        self
    }
}

impl From<mirror_fs::DirListing> for Listing {
    fn from(listing: mirror_fs::DirListing) -> Self {
        Self {
            files: listing.files.into_iter().collect(),
            folders: listing.folders,
        }
    }
}

/// Anything that can list one directory level of a tree.
pub trait Lister {
    /// List the immediate children of `path`.
    fn list(&self, path: &NormalizedPath) -> Result<Listing>;
}

/// Walk the tree below `root` with the default queue capacity.
pub fn walk(lister: &(impl Lister + ?Sized), root: &NormalizedPath) -> Result<SizedPathSet> {
    walk_with_capacity(lister, root, DEFAULT_CAPACITY)
}

/// Walk the tree below `root`, holding at most `capacity` pending directories.
///
/// Any listing error aborts the walk; no partial result is returned.
pub fn walk_with_capacity(
    lister: &(impl Lister + ?Sized),
    root: &NormalizedPath,
    capacity: usize,
) -> Result<SizedPathSet> {
    let mut result = SizedPathSet::new();
    let mut work = BoundedQueue::new(capacity);
    work.enqueue(root.clone());

    while let Some(path) = work.dequeue() {
        let listing = lister.list(&path).map_err(|e| Error::Listing {
            path: path.clone(),
            source: Box::new(e),
        })?;

        for folder in &listing.folders {
            work.enqueue(path.join(folder));
        }

        for (name, size) in listing.files {
            result.set(path.join(&name), size);
        }
    }

    if work.dropped() > 0 {
        tracing::warn!(
            root = %root,
            dropped = work.dropped(),
            capacity,
            "walk exceeded queue capacity; some directories were not visited"
        );
    }

    Ok(result)
}
