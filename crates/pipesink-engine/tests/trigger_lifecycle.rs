//! Multi-tick trigger scenarios against an on-disk fingerprint store.
//!
//! Each test drives one trigger through several scheduler ticks while the
//! test mutates the in-memory host between ticks:
//! - prime, hold, trigger once per upstream change
//! - activity anywhere in the pipeline suppresses the trigger
//! - renames in the host change the fingerprint
//! - a corrupt or unwritable store turns the tick into a fault

use std::fs;

use pipesink_core::config::TriggerConfig;
use pipesink_core::error::ErrorCode;
use pipesink_core::model::BuildResult;
use pipesink_core::store::{FINGERPRINT_FILE_NAME, FileFingerprintStore};
use pipesink_engine::{PipelineSinkTrigger, TickOutcome};
use tempfile::TempDir;

#[path = "../src/testing.rs"]
mod testing;
use testing::StaticRepo;

/// Root → A → B → Sink, all built and successful.
fn pipeline() -> StaticRepo {
    StaticRepo::new()
        .job("Root", &["A"])
        .job("A", &["B"])
        .job("B", &["Sink"])
        .job("Sink", &[])
        .built("Root", "1", BuildResult::Success)
        .built("A", "1", BuildResult::Success)
        .built("B", "1", BuildResult::Success)
}

fn trigger_in(dir: &TempDir, config: TriggerConfig) -> PipelineSinkTrigger {
    PipelineSinkTrigger::new("Sink-Trigger", dir.path(), config)
}

#[test]
fn primes_then_holds_then_triggers_exactly_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileFingerprintStore::default();
    let trigger = trigger_in(&dir, TriggerConfig::new("Root", "Sink", ""));
    let mut repo = pipeline();

    // Tick 1: no baseline yet.
    let first = trigger.run(&repo, &store);
    let TickOutcome::Primed { fingerprint } = first else {
        panic!("expected primed, got {first:?}");
    };
    let on_disk = fs::read_to_string(dir.path().join(FINGERPRINT_FILE_NAME)).expect("read");
    assert_eq!(on_disk.trim(), fingerprint.as_str());

    // Tick 2: nothing happened upstream.
    assert_eq!(trigger.run(&repo, &store).kind(), "unchanged");

    // Tick 3: A got a new build.
    repo.set_last_build("A", "2", BuildResult::Success);
    assert!(trigger.run(&repo, &store).is_triggered());

    // Tick 4: same state again, no second build.
    assert_eq!(trigger.run(&repo, &store).kind(), "unchanged");
    assert_eq!(repo.scheduled(), vec!["Sink".to_string()]);
}

#[test]
fn upstream_activity_defers_the_trigger_until_settled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileFingerprintStore::default();
    let trigger = trigger_in(&dir, TriggerConfig::new("Root", "Sink", ""));
    let mut repo = pipeline();

    assert_eq!(trigger.run(&repo, &store).kind(), "primed");

    // B starts building after A finished: the pipeline is in flight.
    repo.set_last_build("A", "2", BuildResult::Success);
    repo.set_building("B", true);
    assert_eq!(trigger.run(&repo, &store).kind(), "pipeline_active");
    assert!(repo.scheduled().is_empty());

    // B finishes; now the pipeline settled with two new builds.
    repo.set_building("B", false);
    repo.set_last_build("B", "2", BuildResult::Success);
    assert!(trigger.run(&repo, &store).is_triggered());
    assert_eq!(repo.scheduled().len(), 1);
}

#[test]
fn failing_upstream_holds_until_fixed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileFingerprintStore::default();
    let trigger = trigger_in(&dir, TriggerConfig::new("Root", "Sink", ""));
    let mut repo = pipeline();

    assert_eq!(trigger.run(&repo, &store).kind(), "primed");

    repo.set_last_build("B", "2", BuildResult::Failure);
    assert_eq!(
        trigger.run(&repo, &store),
        TickOutcome::PipelineUnstable {
            unhealthy: vec!["B".to_string()]
        }
    );

    // Fixed by a later, successful build.
    repo.set_last_build("B", "3", BuildResult::Success);
    assert!(trigger.run(&repo, &store).is_triggered());
}

#[test]
fn excluded_branch_does_not_affect_the_fingerprint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileFingerprintStore::default();
    let mut repo = StaticRepo::new()
        .job("Root", &["A", "Docs"])
        .job("A", &["Sink"])
        .job("Docs", &[])
        .job("Sink", &[]);
    let trigger = trigger_in(&dir, TriggerConfig::new("Root", "Sink", "Docs"));

    assert_eq!(trigger.run(&repo, &store).kind(), "primed");

    // Docs rebuilds and even fails: invisible to this trigger.
    repo.set_last_build("Docs", "9", BuildResult::Failure);
    assert_eq!(trigger.run(&repo, &store).kind(), "unchanged");
}

#[test]
fn rename_followed_by_the_trigger_keeps_it_working() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileFingerprintStore::default();
    let trigger = trigger_in(&dir, TriggerConfig::new("Root", "Sink", ""));
    let repo = pipeline();
    assert_eq!(trigger.run(&repo, &store).kind(), "primed");

    // The host renames Root; until the trigger follows, Root is unresolved.
    let renamed = StaticRepo::new()
        .job("Root-2", &["A"])
        .job("A", &["B"])
        .job("B", &["Sink"])
        .job("Sink", &[])
        .built("Root-2", "1", BuildResult::Success)
        .built("A", "1", BuildResult::Success)
        .built("B", "1", BuildResult::Success);
    assert_eq!(trigger.run(&renamed, &store).kind(), "root_unavailable");

    assert!(trigger.on_job_renamed("Root", "Root-2"));
    // The full name is part of the fingerprint, so the rename counts as a change.
    assert!(trigger.run(&renamed, &store).is_triggered());
}

#[test]
fn cyclic_pipeline_never_touches_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileFingerprintStore::default();
    let repo = StaticRepo::new()
        .job("Root", &["A"])
        .job("A", &["Root", "Sink"])
        .job("Sink", &[]);
    let trigger = trigger_in(&dir, TriggerConfig::new("Root", "Sink", ""));

    assert_eq!(trigger.run(&repo, &store).kind(), "cycle_detected");
    assert!(!dir.path().join(FINGERPRINT_FILE_NAME).exists());
}

#[test]
fn empty_fingerprint_file_reprimes() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(FINGERPRINT_FILE_NAME), "\n").expect("seed");
    let store = FileFingerprintStore::default();
    let trigger = trigger_in(&dir, TriggerConfig::new("Root", "Sink", ""));
    let repo = pipeline();

    assert_eq!(trigger.run(&repo, &store).kind(), "primed");
    assert!(repo.scheduled().is_empty());
}

#[test]
fn unwritable_state_dir_faults_without_scheduling() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").expect("seed");

    let store = FileFingerprintStore::default();
    let trigger = PipelineSinkTrigger::new(
        "Sink-Trigger",
        blocker.join("state"),
        TriggerConfig::new("Root", "Sink", ""),
    );
    let repo = pipeline();

    let outcome = trigger.run(&repo, &store);
    let TickOutcome::Faulted { code, .. } = outcome else {
        panic!("expected fault, got {outcome:?}");
    };
    assert_eq!(code, ErrorCode::FingerprintWriteFailed.code());
    assert!(repo.scheduled().is_empty());
}
