//! Configuration resolution
//!
//! Configuration is merged from these sources (later sources override earlier):
//!
//! 1. **Built-in defaults**
//! 2. **Global config** - `<config_dir>/treemirror/config.toml`
//! 3. **Explicit file** - passed with `--config`, TOML, JSON or YAML by extension
//! 4. **Overrides** - command-line flags and `TREEMIRROR_*` environment variables
//!
//! # Example
//!
//! ```ignore
//! use mirror_core::config::ConfigResolver;
//!
//! let config = ConfigResolver::new().with_config_file("mirror.toml").resolve()?;
//! println!("mirroring {} into {}", config.source, config.destination.display());
//! ```

mod resolver;
mod settings;

pub use resolver::ConfigResolver;
pub use settings::{
    DEFAULT_LEDGER, LogFormat, NumberOrString, PartialConfig, SyncConfig, parse_duration, parse_level,
    parse_mode,
};
