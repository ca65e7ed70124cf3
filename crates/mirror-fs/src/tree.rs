//! Directory listing and empty-directory pruning

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::{Error, Result};

/// One level of a directory: regular files with their sizes, and subdirectories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    pub files: Vec<(String, u64)>,
    pub folders: Vec<String>,
}

/// List the immediate children of `dir`.
///
/// Symlinks and special files are skipped, as are names that are not valid
/// UTF-8. Entries are returned sorted by name.
pub fn list_dir(dir: &Path) -> Result<DirListing> {
    let mut listing = DirListing::default();

    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::warn!(path = %entry.path().display(), "skipping entry with non UTF-8 name");
            continue;
        };

        if file_type.is_dir() {
            listing.folders.push(name);
        } else if file_type.is_file() {
            let size = entry.metadata().map_err(|e| Error::io(entry.path(), e))?.len();
            listing.files.push((name, size));
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }

    listing.files.sort();
    listing.folders.sort();
    Ok(listing)
}

/// Remove every empty directory below `root`, deepest first.
///
/// A directory whose subdirectories were all pruned becomes empty and is
/// removed in turn. `root` itself is never removed, and a missing `root` is
/// not an error.
pub fn prune_empty_dirs(root: &Path) -> Result<()> {
    match fs::symlink_metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(Error::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(root, e)),
    }

    prune_children(root)?;
    Ok(())
}

/// Prune below `dir` and report whether `dir` is now empty.
fn prune_children(dir: &Path) -> Result<bool> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut remaining = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let is_dir = entry.file_type().map_err(|e| Error::io(&path, e))?.is_dir();

        if is_dir && prune_children(&path)? {
            match fs::remove_dir(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed empty directory");
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(&path, e)),
            }
        }
        remaining += 1;
    }

    Ok(remaining == 0)
}
