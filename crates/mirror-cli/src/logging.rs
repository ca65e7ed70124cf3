//! Tracing subscriber setup
//!
//! Logs go to stderr so reports printed on stdout stay machine-readable.

use mirror_core::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{CliError, Result};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`; `verbose` raises the fallback to debug.
pub fn init(level: &str, format: LogFormat, verbose: bool) -> Result<()> {
    let fallback = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .map_err(|e| CliError::Logging { message: e.to_string() })?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(verbose).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    installed.map_err(|e| CliError::Logging { message: e.to_string() })
}
