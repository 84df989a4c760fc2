//! Ready-made configurations for demos and tests

use crate::arrivals::ArrivalSpec;
use crate::core::Tick;
use crate::dispatcher::SchedulerConfig;
use crate::models::{PatientId, Tier};

const GREEN_ARRIVALS: [Tick; 9] = [2, 6, 12, 14, 18, 22, 26, 28, 32];
const RED_ARRIVALS: [Tick; 9] = [3, 5, 10, 17, 19, 22, 24, 38, 41];

/// Two rooms, a stream of green (Low) and red (High) patients
///
/// Durations and deadlines come from the default tier table. Ids follow
/// arrival order; green comes first on a shared tick.
pub fn color_code_ward() -> SchedulerConfig {
    let mut schedule: Vec<(Tick, Tier)> = GREEN_ARRIVALS
        .iter()
        .map(|&tick| (tick, Tier::Low))
        .chain(RED_ARRIVALS.iter().map(|&tick| (tick, Tier::High)))
        .collect();
    schedule.sort_by_key(|&(tick, _)| tick);

    let arrivals = schedule
        .into_iter()
        .map(|(tick, tier)| ArrivalSpec::new(tier, tick))
        .collect();
    SchedulerConfig::new(2, arrivals)
}

/// One room, four Medium patients with explicit critical times
///
/// Each entry is `(id, arrival, service duration, critical time)`; the
/// deadline is `arrival + critical time`.
pub fn switchboard() -> SchedulerConfig {
    const PATIENTS: [(PatientId, Tick, Tick, Tick); 4] =
        [(1, 2, 3, 9), (2, 2, 4, 6), (3, 6, 4, 6), (4, 8, 1, 2)];

    let arrivals = PATIENTS
        .iter()
        .map(|&(id, arrival, duration, critical)| {
            ArrivalSpec::new(Tier::Medium, arrival)
                .with_id(id)
                .with_service_duration(duration)
                .with_deadline(arrival + critical)
        })
        .collect();
    SchedulerConfig::new(1, arrivals)
}
