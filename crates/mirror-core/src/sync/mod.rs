//! Reconciliation of a local mirror against a remote tree
//!
//! This module provides:
//! - **table**: the state-to-action decision table
//! - **engine**: one reconciliation pass over a sync root
//! - **report**: what a pass did and which paths failed
//! - **scheduler**: repeated passes at a fixed interval

mod engine;
mod report;
mod scheduler;
mod table;

pub use engine::{SyncEngine, SyncOptions};
pub use report::{PassReport, PathFailure};
pub use scheduler::{Scheduler, shutdown_signal};
pub use table::{Action, DecisionTable, PathState, StandardTable};
