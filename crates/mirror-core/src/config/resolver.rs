//! Configuration resolution with layered merge
//!
//! The `ConfigResolver` loads and merges configuration from multiple sources
//! in a defined hierarchy, with later sources overriding earlier ones.

use std::path::{Path, PathBuf};

use mirror_fs::ConfigStore;

use super::settings::{PartialConfig, SyncConfig};
use crate::{Error, Result};

/// Resolves configuration by merging multiple sources
///
/// Configuration is loaded from a hierarchy of sources:
/// 1. Built-in defaults
/// 2. Global config (`<config_dir>/treemirror/config.toml`)
/// 3. An explicit config file (TOML, JSON or YAML)
/// 4. Command-line and environment overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    /// Override for the global config directory (used for testing).
    /// When `None`, the platform-appropriate directory is used via `dirs::config_dir()`.
    global_config_dir_override: Option<PathBuf>,
    config_file: Option<PathBuf>,
    overrides: PartialConfig,
}

impl ConfigResolver {
    /// Create a resolver using the platform-appropriate global config directory:
    /// - Linux: `~/.config/treemirror/`
    /// - macOS: `~/Library/Application Support/treemirror/`
    /// - Windows: `%APPDATA%\treemirror\`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom global config directory instead of the platform one.
    pub fn with_global_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.global_config_dir_override = Some(dir.into());
        self
    }

    /// Layer an explicit config file above the global one. It must exist.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Top layer, typically from command-line flags and environment variables.
    pub fn with_overrides(mut self, overrides: PartialConfig) -> Self {
        self.overrides = overrides;
        self
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join("treemirror"))
    }

    /// Merge every layer without validating the result.
    pub fn merged(&self) -> Result<PartialConfig> {
        let store = ConfigStore::new();
        let mut merged = PartialConfig::defaults();

        if let Some(global_dir) = self.global_config_dir() {
            let global_config_path = global_dir.join("config.toml");
            if global_config_path.is_file() {
                tracing::debug!(?global_config_path, "Loading global config");
                merged.merge(load_layer(&store, &global_config_path)?);
            } else {
                tracing::debug!(?global_config_path, "No global config found, skipping");
            }
        }

        if let Some(ref path) = self.config_file {
            if !path.is_file() {
                return Err(Error::ConfigNotFound { path: path.clone() });
            }
            tracing::debug!(?path, "Loading config file");
            merged.merge(load_layer(&store, path)?);
        }

        merged.merge(self.overrides.clone());
        Ok(merged)
    }

    /// Resolve and validate the final configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a layer cannot be parsed, the explicit config file
    /// is missing, a required key is unset, or a value is invalid.
    pub fn resolve(&self) -> Result<SyncConfig> {
        SyncConfig::try_from(self.merged()?)
    }
}

fn load_layer(store: &ConfigStore, path: &Path) -> Result<PartialConfig> {
    Ok(store.load(path)?)
}
