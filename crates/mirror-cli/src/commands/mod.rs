//! Command implementations for mirror-cli

pub mod completions;
pub mod config;
pub mod ledger;
pub mod sync;

pub use completions::run_completions;
pub use config::run_config;
pub use ledger::{run_ledger_forget, run_ledger_list};
pub use sync::run_sync;
