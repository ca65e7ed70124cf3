//! Ledger command implementations

use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use mirror_core::backend::Ledger;
use mirror_core::{DEFAULT_LEDGER, FileLedger, NormalizedPath, PartialConfig};
use mirror_fs::RobustnessConfig;

use crate::error::{CliError, Result};

/// The ledger commands only need the ledger settings, so the source and
/// destination may be left unset.
fn open_ledger(merged: &PartialConfig) -> Result<FileLedger> {
    let path = merged.ledger.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER));
    let mut robustness = RobustnessConfig::default();
    if let Some(ms) = merged.lock_timeout_ms {
        robustness.lock_timeout = Duration::from_millis(ms);
    }
    if let Some(fsync) = merged.fsync {
        robustness.enable_fsync = fsync;
    }
    Ok(FileLedger::open(path, robustness)?)
}

/// Print recorded paths, optionally limited to a root
pub fn run_ledger_list(merged: &PartialConfig, root: Option<&str>, json: bool) -> Result<()> {
    let ledger = open_ledger(merged)?;
    let root = root.map(NormalizedPath::new).unwrap_or_else(NormalizedPath::root);
    let entries: Vec<_> = ledger
        .entries()
        .into_iter()
        .filter(|entry| entry.path.starts_with(&root))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{} under {}", "No recorded paths".dimmed(), root);
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{}  {}",
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            entry.path
        );
    }
    println!();
    println!("{} recorded under {}", entries.len().to_string().bold(), root);
    Ok(())
}

/// Remove one entry so the next pass classifies the path afresh
pub fn run_ledger_forget(merged: &PartialConfig, path: &str) -> Result<()> {
    let ledger = open_ledger(merged)?;
    let path = NormalizedPath::new(path);

    if !ledger.exists(&path)? {
        return Err(CliError::user(format!("'{path}' is not recorded in {}", ledger.path().display())));
    }

    ledger.delete(&path)?;
    println!("{} Forgot {}", "OK".green().bold(), path.to_string().cyan());
    Ok(())
}
