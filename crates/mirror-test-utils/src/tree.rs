//! [`TestTree`] fixture for mirror scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory tree with helper methods for test setup and
/// assertion. Paths passed to the helpers are relative to the root; a
/// leading `/` is ignored so logical paths can be used directly.
///
/// # Example
///
/// ```rust,no_run
/// use mirror_test_utils::TestTree;
///
/// let remote = TestTree::new();
/// remote.write("shows/e01.mkv", b"episode");
/// remote.assert_exists("shows/e01.mkv");
/// ```
pub struct TestTree {
    temp_dir: TempDir,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Resolve `rel` below the root.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel.trim_start_matches('/'))
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Create the directory `rel` and its ancestors.
    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Read `rel` as bytes.
    ///
    /// # Panics
    /// Panics with the path if the file cannot be read.
    pub fn read(&self, rel: &str) -> Vec<u8> {
        let path = self.path(rel);
        fs::read(&path).unwrap_or_else(|e| panic!("Could not read {}: {e}", path.display()))
    }

    /// Size in bytes of the file at `rel`.
    pub fn file_size(&self, rel: &str) -> u64 {
        let path = self.path(rel);
        fs::metadata(&path)
            .unwrap_or_else(|e| panic!("Could not stat {}: {e}", path.display()))
            .len()
    }

    /// Every regular file below the root, as sorted `/`-separated relative paths.
    pub fn files(&self) -> Vec<String> {
        let mut found = Vec::new();
        collect(self.root(), self.root(), &mut found);
        found.sort();
        found
    }

    /// Assert that `rel` exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_exists(&self, rel: &str) {
        let path = self.path(rel);
        assert!(path.exists(), "Expected path to exist: {}", path.display());
    }

    /// Assert that `rel` does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_missing(&self, rel: &str) {
        let path = self.path(rel);
        assert!(!path.exists(), "Expected path NOT to exist: {}", path.display());
    }
}

fn collect(root: &Path, dir: &Path, found: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, found);
        } else {
            let rel = path.strip_prefix(root).unwrap();
            found.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}
