//! Filesystem layer for treemirror
//!
//! Provides logical path normalization, atomic streaming writes guarded by
//! advisory locks, directory listing and pruning helpers, and format-agnostic
//! configuration loading.

pub mod config;
pub mod error;
pub mod io;
pub mod path;
pub mod tree;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use io::{LockGuard, RobustnessConfig, WriteOptions};
pub use path::NormalizedPath;
pub use tree::{DirListing, list_dir, prune_empty_dirs};
