//! Reconciliation engine for treemirror
//!
//! This crate keeps a local mirror converged with a remote tree, using a
//! durable ledger to tell "never synchronized" apart from "deleted upstream":
//!
//! - **Sets and queue**: path containers and the bounded work queue
//! - **Walker**: flattens any directory [`Lister`] into a sized path set
//! - **Backends**: the collaborator traits and their filesystem, ledger,
//!   manifest and in-memory implementations
//! - **SyncEngine**: one reconciliation pass, plus a repeating [`Scheduler`]
//! - **Configuration resolution**: layered merge of defaults, files and overrides
//!
//! # Architecture
//!
//! ```text
//!                  mirror-cli
//!                      |
//!                 mirror-core
//!                      |
//!                  mirror-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mirror_core::backend::memory::{MemoryDestination, MemoryLedger, MemorySource};
//! use mirror_core::{NormalizedPath, SyncEngine};
//!
//! let source = MemorySource::new().with_file("/a.txt", "hello");
//! let engine = SyncEngine::new(source, MemoryLedger::new(), MemoryDestination::new());
//! let report = engine.process(&NormalizedPath::root())?;
//! assert_eq!(report.bytes_downloaded, 5);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod format;
pub mod ledger;
pub mod precheck;
pub mod queue;
pub mod set;
pub mod sync;
pub mod walker;

pub use backend::{ByteStream, Destination, DirectorySource, Ledger, LocalDestination, Precheck, Source};
pub use config::{ConfigResolver, DEFAULT_LEDGER, LogFormat, NumberOrString, PartialConfig, SyncConfig};
pub use error::{Error, Result};
pub use format::{format_size, format_speed};
pub use ledger::{FileLedger, LedgerEntry};
pub use mirror_fs::NormalizedPath;
pub use precheck::ManifestPrecheck;
pub use queue::{BoundedQueue, DEFAULT_CAPACITY};
pub use set::{PathSet, SizedPathSet};
pub use sync::{
    Action, DecisionTable, PassReport, PathFailure, PathState, Scheduler, StandardTable, SyncEngine,
    SyncOptions, shutdown_signal,
};
pub use walker::{Lister, Listing, walk, walk_with_capacity};
