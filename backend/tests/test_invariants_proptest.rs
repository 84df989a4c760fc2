//! Property tests over random schedules
//!
//! Properties checked after every decision cycle:
//! - occupied rooms never exceed capacity
//! - no patient is both queued and in a room
//! - tiers never move toward less urgent
//! - every patient ends with exactly one Served or Lost
//! - identical input yields an identical event stream

use proptest::prelude::*;
use std::collections::HashMap;
use triage_scheduler_core::arrivals::ArrivalSpec;
use triage_scheduler_core::dispatcher::{Dispatcher, SchedulerConfig};
use triage_scheduler_core::models::{Location, PatientId, Tier};

const HORIZON: usize = 300;

fn arb_tier() -> impl Strategy<Value = Tier> {
    prop_oneof![Just(Tier::Low), Just(Tier::Medium), Just(Tier::High)]
}

fn arb_arrival() -> impl Strategy<Value = ArrivalSpec> {
    (arb_tier(), 0usize..40, 1usize..8, 0usize..20).prop_map(|(tier, arrival, duration, slack)| {
        ArrivalSpec::new(tier, arrival)
            .with_service_duration(duration)
            .with_deadline(arrival + slack)
    })
}

fn arb_config() -> impl Strategy<Value = SchedulerConfig> {
    (1usize..4, 1usize..4, prop::collection::vec(arb_arrival(), 0..30)).prop_map(
        |(capacity, interval, arrivals)| {
            let mut config = SchedulerConfig::new(capacity, arrivals);
            config.escalation_interval = interval;
            config
        },
    )
}

proptest! {
    #[test]
    fn invariants_hold_every_cycle(config in arb_config()) {
        let capacity = config.capacity;
        let total = config.arrivals.len();
        let mut dispatcher = Dispatcher::new(config).unwrap();
        let mut tiers: HashMap<PatientId, Tier> = HashMap::new();

        for _ in 0..HORIZON {
            dispatcher.tick().unwrap();

            prop_assert!(dispatcher.pool().occupied_count() <= capacity);
            prop_assert!(dispatcher.check_invariants().is_ok());

            let state = dispatcher.state();
            for id in state.queued_ids() {
                prop_assert!(matches!(state.location(id), Some(Location::Queued(_))));
                let tier = state.patient(id).unwrap().tier();
                let previous = tiers.insert(id, tier);
                prop_assert!(previous.map_or(true, |before| before <= tier));
            }
            for unit in dispatcher.pool().units() {
                if let Some(id) = unit.occupant() {
                    prop_assert_eq!(state.location(id), Some(Location::Admitted { unit: unit.index }));
                }
            }
        }

        prop_assert!(dispatcher.is_idle());
        let stats = dispatcher.sink();
        prop_assert_eq!(stats.arrivals, total);
        prop_assert_eq!(stats.served + stats.lost(), total);

        for id in 1..=total as PatientId {
            let finals = dispatcher
                .event_log()
                .events_for_patient(id)
                .iter()
                .filter(|e| matches!(e.event_type(), "Served" | "Lost"))
                .count();
            prop_assert_eq!(finals, 1);
        }
    }

    #[test]
    fn identical_input_identical_events(config in arb_config()) {
        let mut first = Dispatcher::new(config.clone()).unwrap();
        let mut second = Dispatcher::new(config).unwrap();
        first.run_to_completion(HORIZON).unwrap();
        second.run_to_completion(HORIZON).unwrap();

        prop_assert_eq!(first.event_log().digest(), second.event_log().digest());
    }

    #[test]
    fn lost_patients_were_never_admitted(config in arb_config()) {
        let mut dispatcher = Dispatcher::new(config).unwrap();
        dispatcher.run_to_completion(HORIZON).unwrap();

        for event in dispatcher.event_log().events_of_type("Lost") {
            let admitted = dispatcher
                .event_log()
                .events_for_patient(event.patient_id())
                .iter()
                .any(|e| e.event_type() == "Admitted");
            prop_assert!(!admitted);
        }
    }
}
