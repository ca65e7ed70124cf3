//! Error types for mirror-core

use std::path::PathBuf;

use mirror_fs::NormalizedPath;

use crate::sync::Action;

/// Result type for mirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A universe could not be enumerated; aborts the pass
    #[error("Failed to enumerate {universe} files under {root}")]
    Enumeration {
        universe: &'static str,
        root: NormalizedPath,
        #[source]
        source: Box<Error>,
    },

    /// A directory listing failed during a walk
    #[error("Failed to list {path}")]
    Listing {
        path: NormalizedPath,
        #[source]
        source: Box<Error>,
    },

    /// The source could not serve a path
    #[error("Source error at {path}: {message}")]
    Source {
        path: NormalizedPath,
        message: String,
    },

    /// The destination could not complete an operation on a path
    #[error("Destination error at {path}: {message}")]
    Destination {
        path: NormalizedPath,
        message: String,
    },

    /// Error in ledger operations
    #[error("Ledger error: {message}")]
    LedgerError { message: String },

    /// The precheck gate itself failed (as opposed to reporting "not ready")
    #[error("Precheck failed for {path}: {message}")]
    Precheck {
        path: NormalizedPath,
        message: String,
    },

    /// A per-path action failed at one of its steps
    #[error("{action} failed at {step} for {path}")]
    Action {
        action: Action,
        step: &'static str,
        path: NormalizedPath,
        #[source]
        source: Box<Error>,
    },

    /// Empty-directory pruning failed; aborts the pass
    #[error("Failed to prune empty directories under {root}")]
    Prune {
        root: NormalizedPath,
        #[source]
        source: Box<Error>,
    },

    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid or incomplete configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// A duration string could not be parsed
    #[error("Invalid duration '{value}': expected a number optionally followed by s, m, h or d")]
    InvalidDuration { value: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from mirror-fs
    #[error(transparent)]
    Fs(#[from] mirror_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Wrap an enumeration failure for one universe.
    pub fn enumeration(universe: &'static str, root: &NormalizedPath, source: Error) -> Self {
        Self::Enumeration {
            universe,
            root: root.clone(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure in one step of a per-path action.
    pub fn action(action: Action, step: &'static str, path: &NormalizedPath, source: Error) -> Self {
        Self::Action {
            action,
            step,
            path: path.clone(),
            source: Box::new(source),
        }
    }

    /// Render the error followed by every source in its chain.
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            current = cause.source();
        }
        rendered
    }
}
