//! Checkpoint Tests - Save/Restore Scheduler State
//!
//! Critical invariants tested:
//! - Determinism: a restored dispatcher produces the same future events
//! - Queue integrity: no orphaned or duplicate patients
//! - Config matching: reject state from a different config

use triage_scheduler_core::arrivals::ArrivalSpec;
use triage_scheduler_core::dispatcher::{
    ConfigError, Dispatcher, SchedulerError, StateSnapshot,
};
use triage_scheduler_core::models::{Event, Tier};
use triage_scheduler_core::presets;

// ============================================================================
// Test Helpers
// ============================================================================

fn events_after(dispatcher: &Dispatcher, tick: usize) -> Vec<Event> {
    dispatcher
        .event_log()
        .events()
        .iter()
        .filter(|e| e.tick() > tick)
        .cloned()
        .collect()
}

// ============================================================================
// Save / Restore
// ============================================================================

#[test]
fn test_restored_run_matches_uninterrupted_run() {
    for split in [0, 3, 7, 9, 12] {
        let mut full = Dispatcher::new(presets::switchboard()).unwrap();
        full.run_to_completion(100).unwrap();

        let mut first_half = Dispatcher::new(presets::switchboard()).unwrap();
        first_half.run_through(split).unwrap();
        let json = serde_json::to_string(&first_half.snapshot().unwrap()).unwrap();

        let snapshot: StateSnapshot = serde_json::from_str(&json).unwrap();
        let mut second_half = Dispatcher::from_snapshot(presets::switchboard(), snapshot).unwrap();
        second_half.run_to_completion(100).unwrap();

        assert_eq!(
            events_after(&full, split),
            second_half.event_log().events().to_vec(),
            "diverged after restoring at tick {split}"
        );
    }
}

#[test]
fn test_restore_preserves_promoted_state() {
    let mut original = Dispatcher::new(presets::color_code_ward()).unwrap();
    original.run_through(20).unwrap();
    let snapshot = original.snapshot().unwrap();

    let restored = Dispatcher::from_snapshot(presets::color_code_ward(), snapshot.clone()).unwrap();
    assert_eq!(restored.now(), original.now());
    assert_eq!(restored.state().queued_ids(), original.state().queued_ids());
    assert_eq!(restored.pool().units(), original.pool().units());
    assert_eq!(restored.snapshot().unwrap(), snapshot);
    assert_eq!(
        restored.snapshot().unwrap().state_hash().unwrap(),
        snapshot.state_hash().unwrap()
    );
}

#[test]
fn test_restored_dispatcher_refuses_reused_id() {
    let mut original = Dispatcher::new(presets::switchboard()).unwrap();
    original.run_to_completion(100).unwrap();

    let mut restored =
        Dispatcher::from_snapshot(presets::switchboard(), original.snapshot().unwrap()).unwrap();
    let err = restored
        .submit(&ArrivalSpec::new(Tier::Low, 50).with_id(2))
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Config(ConfigError::DuplicatePatientId { id: 2 })
    ));
    assert_eq!(restored.submit(&ArrivalSpec::new(Tier::Low, 50)).unwrap(), 5);
}

#[test]
fn test_restore_rejects_different_config() {
    let dispatcher = Dispatcher::new(presets::switchboard()).unwrap();
    let snapshot = dispatcher.snapshot().unwrap();

    let result = Dispatcher::from_snapshot(presets::color_code_ward(), snapshot);
    assert!(matches!(
        result,
        Err(SchedulerError::Config(ConfigError::ConfigMismatch))
    ));
}

#[test]
fn test_restore_rejects_patient_in_two_places() {
    let mut dispatcher = Dispatcher::new(presets::switchboard()).unwrap();
    dispatcher.run_through(3).unwrap();
    let mut snapshot = dispatcher.snapshot().unwrap();

    // Patient 2 is in a room; also queue it
    let admitted = snapshot.admitted[0].patient.clone();
    snapshot.queued.push(admitted);

    let result = Dispatcher::from_snapshot(presets::switchboard(), snapshot);
    assert!(matches!(result, Err(SchedulerError::Consistency(_))));
}
