//! Readiness manifest precheck
//!
//! A manifest is a flat map from paths relative to the sync root to a
//! readiness flag, written by whatever produces the remote tree (a download
//! client, a render farm, a build). Files still being produced are listed as
//! `false` and are left alone until a later pass sees them flip to `true`.
//!
//! ```toml
//! "movies/big.mkv" = true
//! "movies/partial.mkv" = false
//! ```

use std::collections::HashMap;
use std::path::Path;

use mirror_fs::{ConfigStore, NormalizedPath};

use crate::backend::Precheck;
use crate::Result;

/// A [`Precheck`] answering from a readiness manifest.
///
/// Paths outside the sync root or absent from the manifest are not ready.
#[derive(Debug, Clone)]
pub struct ManifestPrecheck {
    root: NormalizedPath,
    ready: HashMap<String, bool>,
}

impl ManifestPrecheck {
    /// Load a TOML, JSON or YAML manifest (chosen by extension).
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or parsed.
    pub fn load(path: &Path, root: NormalizedPath) -> Result<Self> {
        let raw: HashMap<String, bool> = ConfigStore::new().load(path)?;
        tracing::debug!(path = %path.display(), entries = raw.len(), "loaded readiness manifest");
        Ok(Self::from_entries(root, raw))
    }

    /// Build from `(relative path, ready)` pairs.
    pub fn from_entries<K: AsRef<str>>(root: NormalizedPath, entries: impl IntoIterator<Item = (K, bool)>) -> Self {
        let ready = entries
            .into_iter()
            .map(|(key, ready)| (NormalizedPath::new(key.as_ref()).relative().to_string(), ready))
            .collect();
        Self { root, ready }
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }
}

impl Precheck for ManifestPrecheck {
    fn is_ready(&self, path: &NormalizedPath) -> Result<bool> {
        let Some(relative) = path.strip_prefix(&self.root) else {
            tracing::warn!(path = %path, root = %self.root, "path outside sync root; treating as not ready");
            return Ok(false);
        };

        match self.ready.get(relative) {
            Some(&ready) => Ok(ready),
            None => {
                tracing::warn!(path = %path, "path missing from readiness manifest; treating as not ready");
                Ok(false)
            }
        }
    }
}
