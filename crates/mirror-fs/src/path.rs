//! Normalized logical path handling
//!
//! Every universe a pass compares (remote, ledger, local) is keyed by
//! [`NormalizedPath`], so two spellings of the same location must always
//! produce the same value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A logical, slash-separated path rooted at `/`.
///
/// Normalization rules:
/// - backslashes are converted to forward slashes
/// - empty and `.` components are dropped
/// - `..` removes the previous component and never climbs above the root
/// - the result always starts with `/` and never ends with one, except the
///   root itself which is `/`
///
/// Logical paths are converted to native paths only at I/O boundaries via
/// [`NormalizedPath::to_native_under`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy();
        Self {
            inner: clean(&raw),
        }
    }

    /// The sync root, `/`.
    pub fn root() -> Self {
        Self {
            inner: "/".to_string(),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn is_root(&self) -> bool {
        self.inner == "/"
    }

    /// The path without its leading slash (empty for the root).
    pub fn relative(&self) -> &str {
        &self.inner[1..]
    }

    /// Iterate over the path components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.relative().split('/').filter(|c| !c.is_empty())
    }

    /// Number of components; the root has depth zero.
    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// Join this path with a segment.
    ///
    /// The segment may itself contain separators; the result is normalized.
    pub fn join(&self, segment: &str) -> Self {
        Self {
            inner: clean(&format!("{}/{}", self.inner, segment)),
        }
    }

    /// Get the parent directory. The root has no parent.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.inner.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            None => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.inner.rsplit('/').next()
        }
    }

    /// Component-wise prefix test: `/a/b` starts with `/a` but not with `/a/b2`.
    pub fn starts_with(&self, prefix: &NormalizedPath) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.inner == prefix.inner
            || (self.inner.starts_with(&prefix.inner)
                && self.inner.as_bytes().get(prefix.inner.len()) == Some(&b'/'))
    }

    /// The remainder of this path below `prefix`, without a leading slash.
    ///
    /// Returns `None` when `prefix` is not a component-wise prefix.
    pub fn strip_prefix(&self, prefix: &NormalizedPath) -> Option<&str> {
        if !self.starts_with(prefix) {
            return None;
        }
        if prefix.is_root() {
            return Some(self.relative());
        }
        let rest = &self.inner[prefix.inner.len()..];
        Some(rest.trim_start_matches('/'))
    }

    /// Map this logical path onto a native path below `base`.
    pub fn to_native_under(&self, base: &Path) -> PathBuf {
        let mut native = base.to_path_buf();
        for component in self.components() {
            native.push(component);
        }
        native
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }
}

fn clean(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

impl Default for NormalizedPath {
    fn default() -> Self {
        Self::root()
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&String> for NormalizedPath {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

impl From<NormalizedPath> for String {
    fn from(p: NormalizedPath) -> Self {
        p.inner
    }
}
