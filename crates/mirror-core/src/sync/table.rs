//! Reconciliation decision table
//!
//! Every candidate path is classified by three facts: whether the remote
//! has it, whether the ledger has recorded it, and whether the local mirror
//! has it. The eight resulting states map onto five actions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three facts a path is classified by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathState {
    pub has_remote: bool,
    pub is_recorded: bool,
    pub has_local: bool,
}

impl PathState {
    pub const fn new(has_remote: bool, is_recorded: bool, has_local: bool) -> Self {
        Self {
            has_remote,
            is_recorded,
            has_local,
        }
    }

    /// All three collaborators agree the path is synchronized.
    pub fn in_sync(&self) -> bool {
        self.has_remote && self.is_recorded && self.has_local
    }

    /// Every possible state.
    pub fn all() -> impl Iterator<Item = PathState> {
        (0u8..8).map(|bits| PathState::new(bits & 4 != 0, bits & 2 != 0, bits & 1 != 0))
    }
}

impl fmt::Display for PathState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "remote:{}, record:{}, local:{}",
            self.has_remote, self.is_recorded, self.has_local
        )
    }
}

/// What the engine does with a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Stream from the source, write locally, then record.
    Download,
    /// Nothing to do.
    Skip,
    /// Remove the ledger entry and/or the local file, whichever exist.
    Delete,
    /// Record a file already present on both sides.
    Record,
    /// Unreachable in a consistent pass; only logged.
    Log,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Download => "download",
            Action::Skip => "skip",
            Action::Delete => "delete",
            Action::Record => "record",
            Action::Log => "log",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A total mapping from [`PathState`] to [`Action`].
pub trait DecisionTable: Send + Sync {
    fn resolve(&self, state: PathState) -> Action;
}

/// The standard reconciliation policy.
///
/// | remote | recorded | local | action   |
/// |--------|----------|-------|----------|
/// | yes    | no       | no    | download |
/// | yes    | yes      | no    | download |
/// | yes    | yes      | yes   | skip     |
/// | no     | yes      | no    | delete   |
/// | no     | yes      | yes   | delete   |
/// | no     | no       | yes   | delete   |
/// | no     | no       | no    | log      |
/// | yes    | no       | yes   | record   |
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTable;

impl DecisionTable for StandardTable {
    fn resolve(&self, state: PathState) -> Action {
        match (state.has_remote, state.is_recorded, state.has_local) {
            (true, _, false) => Action::Download,
            (true, true, true) => Action::Skip,
            (true, false, true) => Action::Record,
            (false, true, _) | (false, false, true) => Action::Delete,
            (false, false, false) => Action::Log,
        }
    }
}
