//! Source backed by a directory tree
//!
//! Serves a remote tree that is reachable as a mounted directory (NFS, SMB,
//! sshfs, a staging disk). Logical paths map onto the base directory.

use std::fs::File;
use std::path::{Path, PathBuf};

use mirror_fs::NormalizedPath;

use super::{ByteStream, Source};
use crate::walker::{Lister, Listing};
use crate::{Error, Result};

/// A [`Source`] reading from a base directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    base: PathBuf,
}

impl DirectorySource {
    /// Serve the tree below `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` is not an existing directory.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        if !base.is_dir() {
            return Err(Error::Config {
                message: format!("source directory {} does not exist", base.display()),
            });
        }
        Ok(Self { base })
    }

    /// Accepts a bare directory path or a `file://` URL.
    pub fn from_location(location: &str) -> Result<Self> {
        let path = location.strip_prefix("file://").unwrap_or(location);
        if let Some((scheme, _)) = path.split_once("://") {
            return Err(Error::Config {
                message: format!("unsupported source scheme '{scheme}'"),
            });
        }
        Self::new(path)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl Lister for DirectorySource {
    fn list(&self, path: &NormalizedPath) -> Result<Listing> {
        let native = path.to_native_under(&self.base);
        Ok(mirror_fs::list_dir(&native)?.into())
    }
}

impl Source for DirectorySource {
    fn read_file(&self, path: &NormalizedPath) -> Result<ByteStream> {
        let native = path.to_native_under(&self.base);
        let file = File::open(&native).map_err(|e| Error::Source {
            path: path.clone(),
            message: format!("failed to open {}: {e}", native.display()),
        })?;
        Ok(Box::new(file))
    }
}
