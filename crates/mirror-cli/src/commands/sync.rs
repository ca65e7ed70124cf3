//! Sync command implementation

use std::time::Duration;

use colored::Colorize;
use mirror_core::{PartialConfig, PassReport, Scheduler, SyncConfig, SyncEngine, SyncOptions, format_size, shutdown_signal};

use crate::error::Result;

/// Run one pass, or keep running passes when a repeat interval is configured
pub fn run_sync(merged: PartialConfig, dry_run: bool, json: bool) -> Result<()> {
    let config = SyncConfig::try_from(merged)?;
    let options = SyncOptions { dry_run };
    tracing::debug!(
        source = %config.source,
        destination = %config.destination.display(),
        root = %config.root_dir,
        dry_run,
        "starting sync"
    );

    match config.repeat {
        None => {
            let report = run_pass(&config, options)?;
            print_report(&report, json)
        }
        Some(interval) => run_repeating(&config, options, interval, json),
    }
}

/// Build a fresh engine so ledger and manifest changes are picked up every pass.
fn run_pass(config: &SyncConfig, options: SyncOptions) -> mirror_core::Result<PassReport> {
    let engine = SyncEngine::from_config(config)?.with_options(options);
    let report = engine.process(&config.root_dir);
    if let Err(e) = engine.close() {
        tracing::warn!(error = %e.chain(), "failed to close source");
    }
    report
}

fn run_repeating(config: &SyncConfig, options: SyncOptions, interval: Duration, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    let passes = runtime.block_on(async {
        let shutdown = shutdown_signal();
        let pass = || -> mirror_core::Result<PassReport> {
            let report = run_pass(config, options)?;
            if let Err(e) = print_report(&report, json) {
                tracing::warn!(error = %e, "failed to print pass report");
            }
            Ok(report)
        };
        Scheduler::new(interval).run(pass, shutdown).await
    })?;

    if !json {
        println!("{} after {} passes", "Stopped".yellow().bold(), passes);
    }
    Ok(())
}

fn print_report(report: &PassReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    let title = if report.dry_run { "Sync preview (dry run)" } else { "Sync complete" };
    if report.success() {
        println!("{} {}", "OK".green().bold(), title);
    } else {
        println!("{} {} with failures", "WARN".yellow().bold(), title);
    }
    println!("{}:       {}", "Pass".dimmed(), report.pass_id);
    println!("{}:       {}", "Root".dimmed(), report.root);
    println!("{}: {}", "Candidates".dimmed(), report.candidates);
    for (action, count) in &report.actions {
        println!("  {:<10} {}", action.to_string().cyan(), count);
    }
    if report.mismatched > 0 {
        println!("{}: {}", "Size mismatches".yellow(), report.mismatched);
    }
    if report.bytes_downloaded > 0 {
        println!("{}: {}", "Downloaded".dimmed(), format_size(report.bytes_downloaded));
    }

    if !report.deferred.is_empty() {
        println!();
        println!("{} ({}):", "Deferred, not ready".yellow(), report.deferred.len());
        for path in &report.deferred {
            println!("  {} {}", "-".yellow(), path);
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("{} ({}):", "Failed".red().bold(), report.failures.len());
        for failure in &report.failures {
            println!("  {} {} [{}] {}", "x".red(), failure.path, failure.action, failure.message.dimmed());
        }
    }

    Ok(())
}
