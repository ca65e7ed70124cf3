//! Mission tests: configuration through to mirrored trees, over several passes
//!
//! These tests exercise the library the way the CLI does: layered configuration
//! is resolved, an engine is built from it for every pass, and the scheduler
//! drives repeated passes until cancelled.

use std::cell::Cell;
use std::time::Duration;

use mirror_core::{
    Action, ConfigResolver, FileLedger, NormalizedPath, PartialConfig, Scheduler, SyncConfig, SyncEngine,
    SyncOptions,
};
use mirror_fs::RobustnessConfig;
use mirror_test_utils::TestTree;
use pretty_assertions::assert_eq;
use tokio::sync::watch;

struct Mission {
    remote: TestTree,
    mirror: TestTree,
    state: TestTree,
}

impl Mission {
    fn new() -> Self {
        Self {
            remote: TestTree::new(),
            mirror: TestTree::new(),
            state: TestTree::new(),
        }
    }

    /// Resolve a config from a file in the state tree plus flag-style overrides.
    fn config(&self, extra: &str) -> SyncConfig {
        let file = self.state.write(
            "treemirror.toml",
            format!(
                "source = {:?}\ndestination = {:?}\nledger = {:?}\nfsync = false\n{extra}",
                self.remote.root().display().to_string(),
                self.mirror.root().display().to_string(),
                self.state.path("ledger.toml").display().to_string(),
            ),
        );
        ConfigResolver::new()
            .with_global_config_dir(self.state.path("global"))
            .with_config_file(file)
            .resolve()
            .unwrap()
    }

    fn ledger_paths(&self) -> Vec<String> {
        FileLedger::open(self.state.path("ledger.toml"), RobustnessConfig::default())
            .unwrap()
            .entries()
            .into_iter()
            .map(|e| e.path.to_string())
            .collect()
    }
}

fn pass(config: &SyncConfig) -> mirror_core::PassReport {
    SyncEngine::from_config(config).unwrap().process(&config.root_dir).unwrap()
}

#[test]
fn test_mirror_follows_remote_through_its_lifecycle() {
    let mission = Mission::new();
    let config = mission.config("");

    // New season lands upstream.
    mission.remote.write("show/s01/e01.mkv", b"pilot");
    mission.remote.write("show/s01/e02.mkv", b"second");
    let first = pass(&config);
    assert_eq!(first.count(Action::Download), 2);
    assert_eq!(mission.mirror.files(), mission.remote.files());

    // Nothing changed: every path is skipped.
    let second = pass(&config);
    assert_eq!(second.count(Action::Skip), 2);
    assert_eq!(second.bytes_downloaded, 0);

    // An episode is re-encoded upstream with a different size.
    mission.remote.write("show/s01/e02.mkv", b"second, re-encoded");
    let third = pass(&config);
    assert_eq!(third.mismatched, 1);
    assert_eq!(mission.mirror.read("show/s01/e02.mkv"), b"second, re-encoded");

    // The season is removed upstream.
    std::fs::remove_dir_all(mission.remote.path("show")).unwrap();
    let fourth = pass(&config);
    assert_eq!(fourth.count(Action::Delete), 2);
    assert!(mission.mirror.files().is_empty());
    mission.mirror.assert_missing("show");
    assert!(mission.ledger_paths().is_empty());
}

#[test]
fn test_user_deleted_mirror_copy_is_fetched_again() {
    let mission = Mission::new();
    let config = mission.config("");
    mission.remote.write("keep/me.bin", b"precious");
    pass(&config);

    std::fs::remove_file(mission.mirror.path("keep/me.bin")).unwrap();
    let report = pass(&config);

    assert_eq!(report.count(Action::Download), 1);
    assert_eq!(mission.mirror.read("keep/me.bin"), b"precious");
}

#[test]
fn test_manifest_changes_are_seen_by_the_next_engine() {
    let mission = Mission::new();
    mission.remote.write("big.iso", b"iso");
    let manifest = mission.state.write("ready.toml", "\"big.iso\" = false\n");
    let config = mission.config(&format!("precheck = {:?}\n", manifest.display().to_string()));

    let waiting = pass(&config);
    assert_eq!(waiting.deferred, vec![NormalizedPath::new("/big.iso")]);
    mission.mirror.assert_missing("big.iso");

    mission.state.write("ready.toml", "\"big.iso\" = true\n");
    let ready = pass(&config);
    assert!(ready.deferred.is_empty());
    mission.mirror.assert_exists("big.iso");
}

#[test]
fn test_sub_root_from_config_limits_the_pass() {
    let mission = Mission::new();
    mission.remote.write("tv/a.mkv", b"a");
    mission.remote.write("film/b.mkv", b"b");
    let config = mission.config("root_dir = \"tv\"\n");

    assert_eq!(config.root_dir, NormalizedPath::new("/tv"));
    pass(&config);

    assert_eq!(mission.mirror.files(), vec!["tv/a.mkv".to_string()]);
    assert_eq!(mission.ledger_paths(), vec!["/tv/a.mkv".to_string()]);
}

#[test]
fn test_dry_run_reports_without_touching_anything() {
    let mission = Mission::new();
    mission.remote.write("new.bin", b"n");
    mission.mirror.write("orphan.bin", b"o");
    let config = mission.config("");

    let report = SyncEngine::from_config(&config)
        .unwrap()
        .with_options(SyncOptions { dry_run: true })
        .process(&config.root_dir)
        .unwrap();

    assert_eq!(report.count(Action::Download), 1);
    assert_eq!(report.count(Action::Delete), 1);
    assert_eq!(mission.mirror.files(), vec!["orphan.bin".to_string()]);
    mission.state.assert_missing("ledger.toml");
}

#[test]
fn test_overrides_beat_the_config_file() {
    let mission = Mission::new();
    let file = mission.state.write("c.toml", "source = \"/nowhere\"\ndestination = \"/also/nowhere\"\n");

    let config = ConfigResolver::new()
        .with_global_config_dir(mission.state.path("global"))
        .with_config_file(file)
        .with_overrides(PartialConfig {
            source: Some(mission.remote.root().display().to_string()),
            repeat: Some("2m".into()),
            ..PartialConfig::default()
        })
        .resolve()
        .unwrap();

    assert_eq!(config.source, mission.remote.root().display().to_string());
    assert_eq!(config.repeat, Some(Duration::from_secs(120)));
    assert_eq!(config.destination.display().to_string(), "/also/nowhere");
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_picks_up_upstream_changes_between_passes() {
    let mission = Mission::new();
    let config = mission.config("repeat = \"10m\"\n");
    mission.remote.write("day1.log", b"1");

    let (tx, rx) = watch::channel(false);
    let run = Cell::new(0);
    let scheduler = Scheduler::new(config.repeat.unwrap());

    let passes = scheduler
        .run(
            || {
                run.set(run.get() + 1);
                let report = SyncEngine::from_config(&config)?.process(&config.root_dir)?;
                match run.get() {
                    1 => {
                        mission.remote.write("day2.log", b"22");
                    }
                    2 => {
                        std::fs::remove_file(mission.remote.path("day1.log")).unwrap();
                    }
                    _ => {
                        tx.send(true).unwrap();
                    }
                }
                Ok(report)
            },
            rx,
        )
        .await
        .unwrap();

    assert_eq!(passes, 3);
    assert_eq!(mission.mirror.files(), vec!["day2.log".to_string()]);
    assert_eq!(mission.ledger_paths(), vec!["/day2.log".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_survives_a_failing_pass() {
    let mission = Mission::new();
    let config = mission.config("");
    mission.remote.write("a.txt", b"a");

    let (tx, rx) = watch::channel(false);
    let run = Cell::new(0);

    let passes = Scheduler::new(Duration::from_secs(60))
        .run(
            || {
                run.set(run.get() + 1);
                if run.get() == 2 {
                    // Source vanishes for one pass.
                    return Err(mirror_core::Error::Config {
                        message: "source unavailable".to_string(),
                    });
                }
                if run.get() == 3 {
                    tx.send(true).unwrap();
                }
                SyncEngine::from_config(&config)?.process(&config.root_dir)
            },
            rx,
        )
        .await
        .unwrap();

    assert_eq!(passes, 3);
    mission.mirror.assert_exists("a.txt");
}
