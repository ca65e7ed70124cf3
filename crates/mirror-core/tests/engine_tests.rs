//! Tests for the SyncEngine against in-memory collaborators

use mirror_core::backend::memory::{MemoryDestination, MemoryLedger, MemorySource, StaticPrecheck};
use mirror_core::{Action, DecisionTable, Error, NormalizedPath, PathState, StandardTable, SyncEngine, SyncOptions};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn p(path: &str) -> NormalizedPath {
    NormalizedPath::new(path)
}

#[derive(Default)]
struct Fixture {
    source: MemorySource,
    ledger: MemoryLedger,
    destination: MemoryDestination,
}

impl Fixture {
    fn engine(&self) -> SyncEngine {
        SyncEngine::new(
            self.source.clone(),
            self.ledger.clone(),
            self.destination.clone(),
        )
    }
}

#[test]
fn test_downloads_new_remote_file() {
    let fx = Fixture::default();
    fx.source.put("/a.txt", "hello");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.count(Action::Download), 1);
    assert_eq!(report.bytes_downloaded, 5);
    assert_eq!(fx.destination.content(&p("/a.txt")), Some(b"hello".to_vec()));
    assert!(fx.ledger.contains(&p("/a.txt")));
    assert!(report.success());
}

#[test]
fn test_deletes_record_and_local_when_remote_is_gone() {
    let fx = Fixture::default();
    fx.ledger.put("/gone.txt");
    fx.destination.put("/gone.txt", "stale");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.count(Action::Delete), 1);
    assert!(fx.destination.files().is_empty());
    assert!(fx.ledger.paths().is_empty());
}

#[test]
fn test_deletes_orphaned_record() {
    let fx = Fixture::default();
    fx.ledger.put("/old");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.count(Action::Delete), 1);
    assert!(fx.ledger.paths().is_empty());
    assert_eq!(fx.destination.deletes(), 0);
}

#[test]
fn test_deletes_unrecorded_local_file() {
    let fx = Fixture::default();
    fx.destination.put("/local-only", "x");

    fx.engine().process(&NormalizedPath::root()).unwrap();

    assert!(fx.destination.files().is_empty());
}

#[test]
fn test_backfills_record_without_transfer() {
    let fx = Fixture::default();
    fx.source.put("/x.bin", "same");
    fx.destination.put("/x.bin", "same");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.count(Action::Record), 1);
    assert!(fx.ledger.contains(&p("/x.bin")));
    assert_eq!(fx.source.reads(), 0);
    assert_eq!(fx.destination.writes(), 0);
}

#[test]
fn test_size_mismatch_deletes_then_redownloads() {
    let fx = Fixture::default();
    fx.source.put("/movie.mkv", "0123456789");
    fx.destination.put("/movie.mkv", "01234");
    fx.ledger.put("/movie.mkv");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.mismatched, 1);
    assert_eq!(report.count(Action::Download), 1);
    assert_eq!(report.count(Action::Skip), 0);
    assert_eq!(fx.destination.deletes(), 1);
    assert_eq!(fx.destination.content(&p("/movie.mkv")), Some(b"0123456789".to_vec()));
}

#[test]
fn test_redownloads_recorded_file_missing_locally() {
    let fx = Fixture::default();
    fx.source.put("/lost", "abc");
    fx.ledger.put("/lost");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.count(Action::Download), 1);
    assert_eq!(fx.destination.content(&p("/lost")), Some(b"abc".to_vec()));
}

#[test]
fn test_second_pass_only_skips() {
    let fx = Fixture::default();
    fx.source.put("/a", "1");
    fx.source.put("/dir/b", "22");
    let engine = fx.engine();

    engine.process(&NormalizedPath::root()).unwrap();
    let second = engine.process(&NormalizedPath::root()).unwrap();

    assert_eq!(second.count(Action::Skip), 2);
    assert_eq!(second.actions.len(), 1);
    assert_eq!(fx.destination.writes(), 2);
}

#[test]
fn test_every_pass_gets_its_own_id() {
    let fx = Fixture::default();
    let engine = fx.engine();

    let first = engine.process(&NormalizedPath::root()).unwrap();
    let second = engine.process(&NormalizedPath::root()).unwrap();

    assert_ne!(first.pass_id, second.pass_id);
}

#[test]
fn test_precheck_defers_until_ready() {
    let fx = Fixture::default();
    fx.source.put("/big.iso", "payload");
    let precheck = StaticPrecheck::new().with("/big.iso", false);
    let engine = fx.engine().with_precheck(precheck.clone());

    let first = engine.process(&NormalizedPath::root()).unwrap();
    assert_eq!(first.deferred, vec![p("/big.iso")]);
    assert!(first.success());
    assert_eq!(fx.destination.writes(), 0);
    assert!(!fx.ledger.contains(&p("/big.iso")));

    precheck.set("/big.iso", true);
    let second = engine.process(&NormalizedPath::root()).unwrap();
    assert!(second.deferred.is_empty());
    assert!(fx.ledger.contains(&p("/big.iso")));
}

#[test]
fn test_precheck_error_is_a_path_failure() {
    let fx = Fixture::default();
    fx.source.put("/f", "x");
    let precheck = StaticPrecheck::new();
    precheck.fail_for("/f");

    let report = fx.engine().with_precheck(precheck).process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].action, Action::Download);
    assert!(report.failures[0].message.contains("precheck"));
}

#[test]
fn test_failed_write_does_not_stop_the_pass() {
    let fx = Fixture::default();
    fx.source.put("/bad", "bad");
    fx.source.put("/good", "good");
    fx.destination.fail_write_of("/bad");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, p("/bad"));
    assert_eq!(report.failures[0].action, Action::Download);
    assert!(fx.ledger.contains(&p("/good")));
    assert!(!fx.ledger.contains(&p("/bad")));
}

#[test]
fn test_interrupted_stream_leaves_nothing_behind() {
    let fx = Fixture::default();
    fx.source.put("/f", "0123456789");
    fx.source.break_stream_of("/f");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(fx.destination.files().is_empty());
    assert!(!fx.ledger.contains(&p("/f")));
}

#[test]
fn test_failed_record_is_retried_as_backfill() {
    let fx = Fixture::default();
    fx.source.put("/f", "data");
    fx.ledger.fail_record_of("/f");

    let first = fx.engine().process(&NormalizedPath::root()).unwrap();
    assert_eq!(first.failures.len(), 1);
    assert!(first.failures[0].message.contains("at record"));
    assert_eq!(fx.destination.content(&p("/f")), Some(b"data".to_vec()));

    let second = fx.engine().process(&NormalizedPath::root()).unwrap();
    assert_eq!(second.count(Action::Record), 1);
}

#[test]
fn test_failed_mismatch_delete_skips_the_path() {
    let fx = Fixture::default();
    fx.source.put("/f", "longer");
    fx.destination.put("/f", "short");
    fx.destination.fail_delete_of("/f");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(report.mismatched, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].action, Action::Delete);
    assert!(report.actions.is_empty());
    assert_eq!(fx.destination.writes(), 0);
}

#[rstest]
#[case::remote("remote")]
#[case::recorded("recorded")]
#[case::local("local")]
fn test_enumeration_failure_aborts_the_pass(#[case] failing: &str) {
    let fx = Fixture::default();
    fx.source.put("/f", "x");
    match failing {
        "remote" => fx.source.fail_listing(),
        "recorded" => fx.ledger.fail_listing(),
        _ => fx.destination.fail_listing(),
    }

    let err = fx.engine().process(&NormalizedPath::root()).unwrap_err();

    match err {
        Error::Enumeration { universe, .. } => assert_eq!(universe, failing),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.destination.writes(), 0);
    assert_eq!(fx.destination.prunes(), 0);
}

#[test]
fn test_prune_failure_is_fatal() {
    let fx = Fixture::default();
    fx.source.put("/f", "x");
    fx.destination.fail_prune();

    let err = fx.engine().process(&NormalizedPath::root()).unwrap_err();

    assert!(matches!(err, Error::Prune { .. }));
    // Work before pruning still happened.
    assert!(fx.ledger.contains(&p("/f")));
}

#[test]
fn test_empty_directories_are_pruned() {
    let fx = Fixture::default();
    fx.ledger.put("/season/e01");
    fx.destination.put("/season/e01", "x");
    fx.destination.mkdir("/leftover/empty");
    fx.source.put("/keep/e02", "y");

    fx.engine().process(&NormalizedPath::root()).unwrap();

    assert_eq!(fx.destination.dirs(), vec![p("/keep")]);
}

#[test]
fn test_dry_run_changes_nothing() {
    let fx = Fixture::default();
    fx.source.put("/new", "n");
    fx.source.put("/mismatch", "longer");
    fx.destination.put("/mismatch", "s");
    fx.destination.put("/stale", "s");
    fx.destination.mkdir("/empty");
    let precheck = StaticPrecheck::new().with("/new", true).with("/mismatch", true);

    let report = fx
        .engine()
        .with_precheck(precheck.clone())
        .with_options(SyncOptions { dry_run: true })
        .process(&NormalizedPath::root())
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.mismatched, 1);
    assert_eq!(report.count(Action::Download), 2);
    assert_eq!(report.count(Action::Delete), 1);
    assert_eq!(precheck.queries().len(), 2);
    assert_eq!(fx.destination.writes(), 0);
    assert_eq!(fx.destination.deletes(), 0);
    assert_eq!(fx.destination.prunes(), 0);
    assert_eq!(fx.ledger.records(), 0);
    assert_eq!(fx.destination.content(&p("/mismatch")), Some(b"s".to_vec()));
}

#[test]
fn test_only_the_sync_root_is_touched() {
    let fx = Fixture::default();
    fx.source.put("/media/a", "a");
    fx.destination.put("/other/b", "b");

    let report = fx.engine().process(&p("/media")).unwrap();

    assert_eq!(report.candidates, 1);
    assert_eq!(report.root, p("/media"));
    assert!(fx.destination.content(&p("/other/b")).is_some());
    assert!(fx.destination.content(&p("/media/a")).is_some());
}

/// Trusts the ledger: a recorded file missing locally is not fetched again.
struct RecordedMeansSkip;

impl DecisionTable for RecordedMeansSkip {
    fn resolve(&self, state: PathState) -> Action {
        if state == PathState::new(true, true, false) {
            Action::Skip
        } else {
            StandardTable.resolve(state)
        }
    }
}

#[test]
fn test_decision_table_is_substitutable() {
    let fx = Fixture::default();
    fx.source.put("/removed-by-user", "x");
    fx.ledger.put("/removed-by-user");

    let report = fx
        .engine()
        .with_table(RecordedMeansSkip)
        .process(&NormalizedPath::root())
        .unwrap();

    assert_eq!(report.count(Action::Skip), 1);
    assert_eq!(fx.destination.writes(), 0);
}

#[test]
fn test_narrow_walk_capacity_omits_branches() {
    let fx = Fixture::default();
    fx.source.put("/a/1", "1");
    fx.source.put("/b/2", "2");

    let report = fx
        .engine()
        .with_walk_capacity(1)
        .process(&NormalizedPath::root())
        .unwrap();

    assert_eq!(report.count(Action::Download), 1);
    assert_eq!(fx.destination.files(), vec![p("/a/1")]);
}

#[test]
fn test_close_reaches_the_source() {
    let fx = Fixture::default();
    fx.engine().close().unwrap();
    assert!(fx.source.is_closed());
}

#[test]
fn test_report_serializes_to_json() {
    let fx = Fixture::default();
    fx.source.put("/a", "abc");

    let report = fx.engine().process(&NormalizedPath::root()).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["bytes_downloaded"], 3);
    assert_eq!(json["actions"]["download"], 1);
    assert_eq!(json["failures"].as_array().map(Vec::len), Some(0));
}
