//! Threaded Runtime Tests
//!
//! The runtime maps ticks onto real time; results must match the
//! simulated run for a pre-loaded schedule.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use triage_scheduler_core::arrivals::ArrivalSpec;
use triage_scheduler_core::dispatcher::{Dispatcher, SchedulerConfig};
use triage_scheduler_core::models::{Event, LostReason, Tier};
use triage_scheduler_core::presets;
use triage_scheduler_core::runtime::TriageRuntime;
use triage_scheduler_core::stats::StatisticsSink;

const TICK: Duration = Duration::from_millis(5);

/// Counts events into a counter shared with the test
struct SharedCounter(Arc<AtomicUsize>);

impl StatisticsSink for SharedCounter {
    fn record(&mut self, _event: &Event) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_realtime_run_matches_simulation() {
    let mut simulated = Dispatcher::new(presets::switchboard()).unwrap();
    simulated.run_to_completion(1_000).unwrap();

    let runtime = TriageRuntime::spawn(Dispatcher::new(presets::switchboard()).unwrap(), TICK).unwrap();
    assert!(runtime.wait_until_idle(Duration::from_secs(30)));
    let realtime = runtime.shutdown().unwrap();

    assert_eq!(realtime.event_log().events(), simulated.event_log().events());
    assert_eq!(realtime.sink(), simulated.sink());
}

#[test]
fn test_submitted_past_deadline_patient_is_lost() {
    let runtime =
        TriageRuntime::spawn(Dispatcher::new(SchedulerConfig::new(1, Vec::new())).unwrap(), TICK).unwrap();

    let id = runtime
        .submit(&ArrivalSpec::new(Tier::High, 0).with_service_duration(1).with_deadline(0))
        .unwrap();
    assert!(runtime.wait_until_idle(Duration::from_secs(30)));

    let dispatcher = runtime.shutdown().unwrap();
    let history = dispatcher.event_log().events_for_patient(id);
    assert_eq!(history.len(), 2);
    assert!(matches!(
        history[1],
        Event::Lost {
            reason: LostReason::Expired,
            ..
        }
    ));
    assert_eq!(dispatcher.sink().admitted, 0);
}

#[test]
fn test_wait_until_idle_times_out_while_busy() {
    let config = SchedulerConfig::new(
        1,
        vec![ArrivalSpec::new(Tier::Low, 0).with_service_duration(10_000).with_deadline(20_000)],
    );
    let runtime = TriageRuntime::spawn(Dispatcher::new(config).unwrap(), TICK).unwrap();

    assert!(!runtime.wait_until_idle(Duration::from_millis(50)));
    let in_treatment = runtime.with_dispatcher(|d| d.pool().occupied_count());
    assert_eq!(in_treatment, 1);
    assert!(runtime.shutdown().is_ok());
}

#[test]
fn test_drop_joins_dispatcher_thread() {
    let counter = Arc::new(AtomicUsize::new(0));
    let dispatcher =
        Dispatcher::with_sink(presets::switchboard(), SharedCounter(Arc::clone(&counter))).unwrap();
    let runtime = TriageRuntime::spawn(dispatcher, TICK).unwrap();
    assert!(runtime.wait_until_idle(Duration::from_secs(30)));
    drop(runtime);

    // The thread has exited and released the dispatcher with its sink.
    assert_eq!(Arc::strong_count(&counter), 1);
    assert!(counter.load(Ordering::SeqCst) > 0);
}
