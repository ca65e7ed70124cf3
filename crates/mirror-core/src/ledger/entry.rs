//! Ledger entry type

use chrono::{DateTime, Utc};
use mirror_fs::NormalizedPath;
use serde::{Deserialize, Serialize};

/// A path considered synchronized, and when it was last recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub path: NormalizedPath,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create an entry stamped with the current time
    pub fn new(path: NormalizedPath) -> Self {
        Self {
            path,
            recorded_at: Utc::now(),
        }
    }

    /// Create an entry with a specific timestamp (useful for testing)
    pub fn at(path: NormalizedPath, recorded_at: DateTime<Utc>) -> Self {
        Self { path, recorded_at }
    }
}
