//! Collaborator abstractions
//!
//! The engine talks to four collaborators through the traits below:
//! a [`Source`] it mirrors from, a [`Destination`] it mirrors into, a
//! [`Ledger`] remembering what was already synchronized, and an optional
//! [`Precheck`] gate consulted before downloads.
//!
//! Concrete implementations live in the submodules; [`memory`] provides
//! deterministic in-memory doubles.

mod directory;
mod local;
pub mod memory;

pub use directory::DirectorySource;
pub use local::LocalDestination;

use std::io::Read;

use mirror_fs::NormalizedPath;

use crate::Result;
use crate::set::{PathSet, SizedPathSet};
use crate::walker::Lister;

/// A readable byte stream handed from a [`Source`] to a [`Destination`].
pub type ByteStream = Box<dyn Read + Send>;

/// The authoritative remote tree.
///
/// Listing comes from the [`Lister`] supertrait so the walker can flatten it.
pub trait Source: Lister + Send + Sync {
    /// Open `path` for streaming.
    fn read_file(&self, path: &NormalizedPath) -> Result<ByteStream>;

    /// Release any held connection. Called once when the process shuts down.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// The local mirror.
pub trait Destination: Send + Sync {
    /// Every file below `root` with its size.
    fn list_all_files(&self, root: &NormalizedPath) -> Result<SizedPathSet>;

    fn exists(&self, path: &NormalizedPath) -> Result<bool>;

    fn delete(&self, path: &NormalizedPath) -> Result<()>;

    /// Write the stream to `path`; the file must only appear once complete.
    ///
    /// Returns the number of bytes written.
    fn write(&self, path: &NormalizedPath, stream: &mut dyn Read) -> Result<u64>;

    /// Remove directories below `root` left without any entries.
    fn prune_empty_dirs(&self, root: &NormalizedPath) -> Result<()>;
}

/// Durable record of previously synchronized paths.
pub trait Ledger: Send + Sync {
    /// Every recorded path below `root`.
    fn list_all_paths(&self, root: &NormalizedPath) -> Result<PathSet>;

    fn exists(&self, path: &NormalizedPath) -> Result<bool>;

    /// Record `path` as synchronized. Recording twice is not an error.
    fn record(&self, path: &NormalizedPath) -> Result<()>;

    fn delete(&self, path: &NormalizedPath) -> Result<()>;
}

/// Readiness oracle consulted before downloading a path.
pub trait Precheck: Send + Sync {
    /// `Ok(false)` defers the download to a later pass.
    fn is_ready(&self, path: &NormalizedPath) -> Result<bool>;
}
