//! Repeating pass scheduler
//!
//! Runs a pass immediately, then again every interval until cancelled.
//! Cancellation is only observed between passes; a pass that has started
//! always runs to completion.

use std::time::Duration;

use tokio::sync::watch;

use super::report::PassReport;
use crate::Result;

/// Drives repeated passes at a fixed interval
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run passes until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Returns the number of passes run.
    ///
    /// # Errors
    ///
    /// Only a failure of the first pass is returned; later failures are
    /// logged and the schedule continues.
    pub async fn run<F>(&self, mut pass: F, mut shutdown: watch::Receiver<bool>) -> Result<usize>
    where
        F: FnMut() -> Result<PassReport>,
    {
        let first = pass()?;
        tracing::info!(pass_id = %first.pass_id, summary = %first.summary(), "initial pass finished");
        let mut passes = 1;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::debug!("shutdown sender dropped");
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            passes += 1;
            match pass() {
                Ok(report) => {
                    tracing::info!(pass_id = %report.pass_id, summary = %report.summary(), "pass finished");
                }
                Err(e) => {
                    tracing::warn!(error = %e.chain(), "pass failed, retrying next interval");
                }
            }
        }

        tracing::info!(passes, "scheduler stopped");
        Ok(passes)
    }
}

/// A receiver that flips to `true` on Ctrl-C, or SIGTERM on Unix.
///
/// Handlers are registered before this returns, so a signal that arrives
/// while the first pass is still running is caught rather than killing the
/// process. Must be called from within a Tokio runtime.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    let signals = Signals::install();
    tokio::spawn(async move {
        signals.recv().await;
        tracing::info!("shutdown signal received, stopping after the current pass");
        let _ = tx.send(true);
        // Keep the sender alive so receivers see the value, not a closed channel.
        tx.closed().await;
    });
    rx
}

/// Signal streams registered with the OS at construction time.
struct Signals {
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
    #[cfg(windows)]
    ctrl_c: Option<tokio::signal::windows::CtrlC>,
}

impl Signals {
    #[cfg(unix)]
    fn install() -> Self {
        use tokio::signal::unix::{SignalKind, signal};
        let install = |kind: SignalKind, name: &str| match signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!(error = %e, signal = name, "failed to install signal handler");
                None
            }
        };
        Self {
            interrupt: install(SignalKind::interrupt(), "SIGINT"),
            terminate: install(SignalKind::terminate(), "SIGTERM"),
        }
    }

    #[cfg(windows)]
    fn install() -> Self {
        let ctrl_c = tokio::signal::windows::ctrl_c()
            .map_err(|e| tracing::warn!(error = %e, "failed to install Ctrl+C handler"))
            .ok();
        Self { ctrl_c }
    }

    #[cfg(not(any(unix, windows)))]
    fn install() -> Self {
        Self {}
    }

    #[cfg(unix)]
    async fn recv(self) {
        let Self { interrupt, terminate } = self;
        tokio::select! {
            _ = next(interrupt) => {},
            _ = next(terminate) => {},
        }
    }

    #[cfg(windows)]
    async fn recv(self) {
        match self.ctrl_c {
            Some(mut stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    #[cfg(not(any(unix, windows)))]
    async fn recv(self) {
        std::future::pending::<()>().await
    }
}

/// Wait for the next delivery; a missing stream never fires.
#[cfg(unix)]
async fn next(stream: Option<tokio::signal::unix::Signal>) {
    match stream {
        Some(mut stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
