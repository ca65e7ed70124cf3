//! SyncEngine implementation
//!
//! The SyncEngine reconciles one sync root per call to [`SyncEngine::process`]:
//! it collects the remote, recorded and local universes, classifies every
//! candidate path, dispatches the resulting action and finally prunes empty
//! local directories. No state is carried from one pass to the next.

use std::time::Instant;

use mirror_fs::NormalizedPath;

use super::report::PassReport;
use super::table::{Action, DecisionTable, PathState, StandardTable};
use crate::backend::{Destination, DirectorySource, Ledger, LocalDestination, Precheck, Source};
use crate::config::SyncConfig;
use crate::format::{format_size, format_speed};
use crate::ledger::FileLedger;
use crate::precheck::ManifestPrecheck;
use crate::queue::DEFAULT_CAPACITY;
use crate::set::{PathSet, SizedPathSet};
use crate::{walker, Error, Result};

/// Options for a reconciliation pass
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// If true, classify and count without touching the ledger or the
    /// local mirror. The precheck is still consulted.
    pub dry_run: bool,
}

/// The three universes collected at the start of a pass.
struct Universes {
    remote: SizedPathSet,
    recorded: PathSet,
    local: SizedPathSet,
}

/// Engine reconciling a local mirror against a remote tree
pub struct SyncEngine {
    source: Box<dyn Source>,
    ledger: Box<dyn Ledger>,
    destination: Box<dyn Destination>,
    precheck: Option<Box<dyn Precheck>>,
    table: Box<dyn DecisionTable>,
    options: SyncOptions,
    walk_capacity: usize,
}

impl SyncEngine {
    /// Create an engine using the [`StandardTable`] and no precheck
    pub fn new(
        source: impl Source + 'static,
        ledger: impl Ledger + 'static,
        destination: impl Destination + 'static,
    ) -> Self {
        Self {
            source: Box::new(source),
            ledger: Box::new(ledger),
            destination: Box::new(destination),
            precheck: None,
            table: Box::new(StandardTable),
            options: SyncOptions::default(),
            walk_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Wire the directory source, file ledger, local destination and optional
    /// readiness manifest described by `config`.
    ///
    /// The ledger and manifest are read here, so a long-running schedule
    /// should build a fresh engine for every pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the source location is unusable or the ledger or
    /// manifest cannot be loaded.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let source = DirectorySource::from_location(&config.source)?;
        let ledger = FileLedger::open(&config.ledger, config.robustness())?;
        let destination = LocalDestination::new(&config.destination)
            .with_write_options(config.write_options())
            .with_walk_capacity(config.walk_capacity);

        let mut engine = Self::new(source, ledger, destination).with_walk_capacity(config.walk_capacity);
        if let Some(ref manifest) = config.precheck {
            engine = engine.with_precheck(ManifestPrecheck::load(manifest, config.root_dir.clone())?);
        }
        Ok(engine)
    }

    /// Gate downloads on a readiness check
    pub fn with_precheck(mut self, precheck: impl Precheck + 'static) -> Self {
        self.precheck = Some(Box::new(precheck));
        self
    }

    /// Replace the decision table
    pub fn with_table(mut self, table: impl DecisionTable + 'static) -> Self {
        self.table = Box::new(table);
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Bound the directory queue used to walk the remote tree
    pub fn with_walk_capacity(mut self, capacity: usize) -> Self {
        self.walk_capacity = capacity;
        self
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Release the source's resources. Call once at shutdown.
    pub fn close(&self) -> Result<()> {
        self.source.close()
    }

    /// Run one reconciliation pass over `root`
    ///
    /// # Errors
    ///
    /// Returns an error if any universe cannot be enumerated or if pruning
    /// fails. Per-path failures do not abort the pass; they are listed in
    /// the returned report.
    pub fn process(&self, root: &NormalizedPath) -> Result<PassReport> {
        let mut report = PassReport::new(root.clone(), self.options.dry_run);
        let span = tracing::info_span!("pass", pass_id = %report.pass_id, root = %root);
        let _enter = span.enter();

        let universes = self.collect(root)?;
        let candidates = universes
            .remote
            .to_path_set()
            .union(&universes.recorded)
            .union(&universes.local.to_path_set());
        report.candidates = candidates.len();
        tracing::info!(count = candidates.len(), "total candidate paths");

        for path in candidates.to_sorted_vec() {
            self.reconcile(&path, &universes, &mut report);
        }

        if self.options.dry_run {
            tracing::info!("dry run, skipping directory pruning");
        } else {
            self.destination
                .prune_empty_dirs(root)
                .map_err(|e| Error::Prune {
                    root: root.clone(),
                    source: Box::new(e),
                })?;
        }

        tracing::info!(summary = %report.summary(), "pass complete");
        Ok(report)
    }

    fn collect(&self, root: &NormalizedPath) -> Result<Universes> {
        let remote = walker::walk_with_capacity(self.source.as_ref(), root, self.walk_capacity)
            .map_err(|e| Error::enumeration("remote", root, e))?;
        tracing::info!(count = remote.len(), "found remote files");

        let recorded = self
            .ledger
            .list_all_paths(root)
            .map_err(|e| Error::enumeration("recorded", root, e))?;
        tracing::info!(count = recorded.len(), "found recorded files");

        let local = self
            .destination
            .list_all_files(root)
            .map_err(|e| Error::enumeration("local", root, e))?;
        tracing::info!(count = local.len(), "found local files");

        Ok(Universes {
            remote,
            recorded,
            local,
        })
    }

    /// Classify one path and carry out its action, recording any failure.
    fn reconcile(&self, path: &NormalizedPath, universes: &Universes, report: &mut PassReport) {
        let remote_size = universes.remote.get(path);
        let mut local_size = universes.local.get(path);

        if let (Some(remote), Some(local)) = (remote_size, local_size)
            && remote != local
        {
            report.mismatched += 1;
            tracing::warn!(
                path = %path,
                remote_size = remote,
                local_size = local,
                "local file out of sync with remote, deleting"
            );
            if !self.options.dry_run
                && let Err(e) = self.destination.delete(path)
            {
                let err = Error::action(Action::Delete, "mismatch delete", path, e);
                tracing::error!(path = %path, error = %err.chain(), "failed to delete mismatched local file");
                report.failed(path, Action::Delete, &err);
                return;
            }
            local_size = None;
        }

        let state = PathState {
            has_remote: remote_size.is_some(),
            is_recorded: universes.recorded.contains(path),
            has_local: local_size.is_some(),
        };
        let action = self.table.resolve(state);
        report.dispatched(action);

        if !state.in_sync() && action != Action::Skip {
            tracing::info!(path = %path, action = %action, state = %state, "out of sync");
        }

        if let Err(e) = self.execute(action, state, path, report) {
            tracing::error!(
                path = %path,
                action = %action,
                state = %state,
                error = %e.chain(),
                "action failed"
            );
            report.failed(path, action, &e);
        }
    }

    fn execute(&self, action: Action, state: PathState, path: &NormalizedPath, report: &mut PassReport) -> Result<()> {
        match action {
            Action::Download => self.download(path, report),
            Action::Delete => self.delete(state, path),
            Action::Record => self.record(path),
            Action::Skip => Ok(()),
            Action::Log => {
                tracing::warn!(path = %path, state = %state, "path in an unexpected state");
                Ok(())
            }
        }
    }

    fn download(&self, path: &NormalizedPath, report: &mut PassReport) -> Result<()> {
        if let Some(precheck) = &self.precheck {
            let ready = precheck
                .is_ready(path)
                .map_err(|e| Error::action(Action::Download, "precheck", path, e))?;
            if !ready {
                tracing::info!(path = %path, "not yet ready, deferring download");
                report.deferred.push(path.clone());
                return Ok(());
            }
        }

        if self.options.dry_run {
            tracing::debug!(path = %path, "dry run, would download");
            return Ok(());
        }

        tracing::info!(path = %path, "downloading");
        let mut stream = self
            .source
            .read_file(path)
            .map_err(|e| Error::action(Action::Download, "read", path, e))?;

        let start = Instant::now();
        let bytes = self
            .destination
            .write(path, &mut stream)
            .map_err(|e| Error::action(Action::Download, "write", path, e))?;
        let elapsed = start.elapsed();
        drop(stream);

        report.bytes_downloaded += bytes;
        tracing::info!(
            path = %path,
            bytes,
            size = %format_size(bytes),
            seconds = elapsed.as_secs(),
            speed = %format_speed(bytes, elapsed),
            "download complete"
        );

        self.ledger
            .record(path)
            .map_err(|e| Error::action(Action::Download, "record", path, e))
    }

    fn delete(&self, state: PathState, path: &NormalizedPath) -> Result<()> {
        if self.options.dry_run {
            tracing::debug!(path = %path, state = %state, "dry run, would delete");
            return Ok(());
        }

        if state.is_recorded {
            tracing::info!(path = %path, "deleting record");
            self.ledger
                .delete(path)
                .map_err(|e| Error::action(Action::Delete, "unrecord", path, e))?;
        }

        if state.has_local {
            tracing::info!(path = %path, "deleting local file");
            self.destination
                .delete(path)
                .map_err(|e| Error::action(Action::Delete, "local delete", path, e))?;
        }

        Ok(())
    }

    fn record(&self, path: &NormalizedPath) -> Result<()> {
        if self.options.dry_run {
            tracing::debug!(path = %path, "dry run, would record");
            return Ok(());
        }

        tracing::info!(path = %path, "recording");
        self.ledger
            .record(path)
            .map_err(|e| Error::action(Action::Record, "record", path, e))
    }
}
