//! Pass report

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mirror_fs::NormalizedPath;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::table::Action;
use crate::Error;

/// A per-path action that failed without aborting the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFailure {
    pub path: NormalizedPath,
    pub action: Action,
    pub message: String,
}

/// Report from one completed reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    /// Unique identifier correlating the pass with its log lines
    pub pass_id: Uuid,
    pub root: NormalizedPath,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    /// Size of the union of the three universes
    pub candidates: usize,
    /// How many paths were dispatched to each action
    pub actions: BTreeMap<Action, usize>,
    /// Local files deleted because their size differed from the remote
    pub mismatched: usize,
    /// Downloads the precheck held back for a later pass
    pub deferred: Vec<NormalizedPath>,
    pub bytes_downloaded: u64,
    pub failures: Vec<PathFailure>,
}

impl PassReport {
    /// Start an empty report for a pass over `root`
    pub fn new(root: NormalizedPath, dry_run: bool) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            root,
            dry_run,
            started_at: Utc::now(),
            candidates: 0,
            actions: BTreeMap::new(),
            mismatched: 0,
            deferred: Vec::new(),
            bytes_downloaded: 0,
            failures: Vec::new(),
        }
    }

    /// True when no path failed.
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of paths dispatched to `action`.
    pub fn count(&self, action: Action) -> usize {
        self.actions.get(&action).copied().unwrap_or(0)
    }

    pub(crate) fn dispatched(&mut self, action: Action) {
        *self.actions.entry(action).or_insert(0) += 1;
    }

    pub(crate) fn failed(&mut self, path: &NormalizedPath, action: Action, error: &Error) {
        self.failures.push(PathFailure {
            path: path.clone(),
            action,
            message: error.chain(),
        });
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let actions = self
            .actions
            .iter()
            .map(|(action, count)| format!("{action}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} candidates [{}], {} mismatched, {} deferred, {} downloaded, {} failed",
            self.candidates,
            actions,
            self.mismatched,
            self.deferred.len(),
            crate::format::format_size(self.bytes_downloaded),
            self.failures.len(),
        )
    }
}
