//! Destination backed by the local filesystem

use std::io::Read;
use std::path::{Path, PathBuf};

use mirror_fs::io::{self, WriteOptions};
use mirror_fs::NormalizedPath;

use super::Destination;
use crate::queue::DEFAULT_CAPACITY;
use crate::set::SizedPathSet;
use crate::walker::{self, Lister, Listing};
use crate::Result;

/// A [`Destination`] mirroring into a base directory.
///
/// Writes go through a temporary file in the target directory followed by an
/// atomic rename, so a file only ever appears at its final path complete and
/// with its final mode and owner.
#[derive(Debug, Clone)]
pub struct LocalDestination {
    base: PathBuf,
    options: WriteOptions,
    walk_capacity: usize,
}

impl LocalDestination {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            options: WriteOptions {
                fsync: true,
                ..WriteOptions::default()
            },
            walk_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Set the modes, owners and durability applied to written files.
    pub fn with_write_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Bound the directory queue used when enumerating the local tree.
    pub fn with_walk_capacity(mut self, capacity: usize) -> Self {
        self.walk_capacity = capacity;
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn native(&self, path: &NormalizedPath) -> PathBuf {
        path.to_native_under(&self.base)
    }
}

impl Lister for LocalDestination {
    fn list(&self, path: &NormalizedPath) -> Result<Listing> {
        Ok(mirror_fs::list_dir(&self.native(path))?.into())
    }
}

impl Destination for LocalDestination {
    fn list_all_files(&self, root: &NormalizedPath) -> Result<SizedPathSet> {
        let native = self.native(root);
        if !native.exists() {
            tracing::debug!(root = %root, base = %self.base.display(), "local root missing; nothing mirrored yet");
            return Ok(SizedPathSet::new());
        }
        walker::walk_with_capacity(self, root, self.walk_capacity)
    }

    fn exists(&self, path: &NormalizedPath) -> Result<bool> {
        let native = self.native(path);
        native
            .try_exists()
            .map_err(|e| mirror_fs::Error::io(&native, e).into())
    }

    fn delete(&self, path: &NormalizedPath) -> Result<()> {
        let native = self.native(path);
        std::fs::remove_file(&native).map_err(|e| mirror_fs::Error::io(&native, e))?;
        Ok(())
    }

    fn write(&self, path: &NormalizedPath, stream: &mut dyn Read) -> Result<u64> {
        let native = self.native(path);
        Ok(io::write_atomic_from(&native, stream, &self.options)?)
    }

    fn prune_empty_dirs(&self, root: &NormalizedPath) -> Result<()> {
        mirror_fs::prune_empty_dirs(&self.native(root))?;
        Ok(())
    }
}
