//! treemirror CLI
//!
//! Keeps a local directory in step with a remote tree, using a ledger to
//! remember what has already been mirrored.

mod cli;
mod commands;
mod error;
mod logging;

use std::error::Error as _;

use clap::Parser;
use colored::Colorize;
use mirror_core::{ConfigResolver, LogFormat, PartialConfig};

use cli::{Cli, Commands, LedgerAction};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        let mut cause = e.source();
        while let Some(inner) = cause {
            eprintln!("  {} {}", "caused by:".dimmed(), inner);
            cause = inner.source();
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command.clone() else {
        println!("{} Keep a local mirror of a remote tree in sync", "treemirror".green().bold());
        println!();
        println!("Run {} for available commands.", "treemirror --help".cyan());
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        return commands::run_completions(shell);
    }

    let mut overrides = cli.overrides.to_partial();
    if let Commands::Sync { repeat: Some(ref every), .. } = command {
        overrides.repeat = Some(every.as_str().into());
    }
    let mut resolver = ConfigResolver::new().with_overrides(overrides);
    if let Some(ref path) = cli.config {
        resolver = resolver.with_config_file(path);
    }
    let merged = resolver.merged()?;

    init_logging(&merged, cli.verbose)?;
    tracing::debug!(?merged, "configuration layers merged");

    match command {
        Commands::Sync { dry_run, json, .. } => commands::run_sync(merged, dry_run, json),
        Commands::Ledger { action } => match action {
            LedgerAction::List { root, json } => commands::run_ledger_list(&merged, root.as_deref(), json),
            LedgerAction::Forget { path } => commands::run_ledger_forget(&merged, &path),
        },
        Commands::Config { json } => commands::run_config(merged, json),
        Commands::Completions { .. } => Ok(()),
    }
}

fn init_logging(merged: &PartialConfig, verbose: bool) -> Result<()> {
    let level = mirror_core::config::parse_level(merged.log_level.as_deref().unwrap_or("warn"))?;
    let format: LogFormat = merged.log_format.as_deref().unwrap_or("text").parse()?;
    logging::init(&level, format, verbose)
}
