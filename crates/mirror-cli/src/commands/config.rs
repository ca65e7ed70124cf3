//! Config command implementation

use mirror_core::{PartialConfig, SyncConfig};

use crate::error::Result;

/// Validate the merged layers and print the result in canonical notation
pub fn run_config(merged: PartialConfig, json: bool) -> Result<()> {
    let config = SyncConfig::try_from(merged)?;
    let canonical = config.to_partial();

    if json {
        println!("{}", serde_json::to_string_pretty(&canonical)?);
    } else {
        print!("{}", toml::to_string_pretty(&canonical)?);
    }
    Ok(())
}
