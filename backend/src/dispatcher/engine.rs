//! Dispatcher Engine
//!
//! The scheduling core. Integrates all components into one decision cycle:
//! - Completion delivery (rooms freed, patients served)
//! - Arrival ingestion (patients queued by tier)
//! - Escalation (promotion or death of overdue patients)
//! - Admission (most urgent patient into a free room)
//!
//! # Architecture
//!
//! ```text
//! Decision cycle at tick t:
//! 1. Deliver completions due at t (unit freed, Served)
//! 2. Ingest arrivals due at t (Arrival)
//! 3. Escalation pass, if t is an escalation tick (Promoted / Lost)
//! 4. Repeat: pick min (urgency, arrival, id) across all tiers;
//!    stop if none, or if no room is free; otherwise admit (Admitted)
//! ```
//!
//! Cycles only change state at *event ticks* (arrival, completion,
//! escalation boundary). [`Dispatcher::run_through`] jumps between event
//! ticks instead of stepping through idle ones, with results identical to
//! calling [`Dispatcher::tick`] once per tick.
//!
//! # Example
//!
//! ```rust
//! use triage_scheduler_core::arrivals::ArrivalSpec;
//! use triage_scheduler_core::dispatcher::{Dispatcher, SchedulerConfig};
//! use triage_scheduler_core::models::Tier;
//!
//! let config = SchedulerConfig::new(1, vec![
//!     ArrivalSpec::new(Tier::Medium, 2).with_service_duration(3).with_deadline(9),
//! ]);
//! let mut dispatcher = Dispatcher::new(config).unwrap();
//!
//! dispatcher.run_to_completion(100).unwrap();
//! assert!(dispatcher.is_idle());
//! assert_eq!(dispatcher.sink().served, 1);
//! ```

use crate::arrivals::{ArrivalFeed, ArrivalSpec};
use crate::core::{Clock, ManualClock, Tick};
use crate::dispatcher::config::{ConfigError, SchedulerConfig};
use crate::escalation::{EscalationMonitor, EscalationOutcome};
use crate::models::{ConsistencyViolation, Event, EventLog, Location, Patient, PatientId, TriageState};
use crate::pool::ResourcePool;
use crate::stats::{Statistics, StatisticsSink};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Scheduler error types
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("consistency violation: {0}")]
    Consistency(#[from] ConsistencyViolation),

    #[error("failed to start dispatcher thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("dispatcher thread terminated abnormally")]
    RuntimeTerminated,
}

/// Result of a single decision cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickResult {
    pub tick: Tick,
    pub num_arrivals: usize,
    pub num_promotions: usize,
    pub num_admitted: usize,
    pub num_served: usize,
    pub num_lost: usize,
}

/// Main dispatcher owning all scheduler state
///
/// # Determinism
///
/// Candidate selection uses the total order `(urgency, arrival_time, id)`,
/// arrivals keep input order on equal ticks and completions fire in
/// `(tick, unit)` order. Same configuration = identical event stream.
pub struct Dispatcher<S: StatisticsSink = Statistics> {
    config: SchedulerConfig,
    clock: ManualClock,
    state: TriageState,
    pool: ResourcePool,
    feed: ArrivalFeed,
    monitor: EscalationMonitor,
    event_log: EventLog,
    sink: S,
}

impl Dispatcher<Statistics> {
    /// Create a dispatcher reporting to a fresh [`Statistics`] sink
    ///
    /// # Returns
    ///
    /// * `Ok(Dispatcher)` - configuration accepted
    /// * `Err(SchedulerError::Config)` - validation failed
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_sink(config, Statistics::new())
    }
}

impl<S: StatisticsSink> Dispatcher<S> {
    /// Create a dispatcher reporting to `sink`
    pub fn with_sink(config: SchedulerConfig, sink: S) -> Result<Self, SchedulerError> {
        config.validate()?;
        let feed = ArrivalFeed::new(&config.arrivals, &config.tiers)?;
        Ok(Self::assemble(config, ManualClock::new(), TriageState::new(), feed, sink))
    }

    pub(crate) fn assemble(
        config: SchedulerConfig,
        clock: ManualClock,
        state: TriageState,
        feed: ArrivalFeed,
        sink: S,
    ) -> Self {
        Self {
            pool: ResourcePool::new(config.capacity),
            monitor: EscalationMonitor::new(config.tiers, config.escalation_interval),
            event_log: EventLog::new(),
            config,
            clock,
            state,
            feed,
            sink,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Tick the next cycle will run at
    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> &TriageState {
        &self.state
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub(crate) fn pool_mut(&mut self) -> &mut ResourcePool {
        &mut self.pool
    }

    pub(crate) fn state_mut(&mut self) -> &mut TriageState {
        &mut self.state
    }

    pub fn feed(&self) -> &ArrivalFeed {
        &self.feed
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Nothing pending, waiting or in treatment
    pub fn is_idle(&self) -> bool {
        self.feed.is_exhausted() && self.state.queued_count() == 0 && self.pool.occupied_count() == 0
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Run one decision cycle at the current tick, then advance one tick
    pub fn tick(&mut self) -> Result<TickResult, SchedulerError> {
        let result = self.run_cycle()?;
        self.clock.advance_tick();
        Ok(result)
    }

    /// Process every event tick up to and including `target`
    ///
    /// Afterwards `now() == target + 1` (or unchanged if already past it).
    pub fn run_through(&mut self, target: Tick) -> Result<Vec<TickResult>, SchedulerError> {
        let mut results = Vec::new();
        while let Some(next) = self.next_event_tick() {
            if next > target {
                break;
            }
            self.clock.advance_to(next);
            results.push(self.tick()?);
        }
        if target >= self.clock.now() {
            self.clock.advance_to(target.saturating_add(1));
        }
        Ok(results)
    }

    /// Run event-driven until idle or until the next event lies past `max_tick`
    ///
    /// Returns the number of decision cycles executed.
    pub fn run_to_completion(&mut self, max_tick: Tick) -> Result<usize, SchedulerError> {
        let mut cycles = 0;
        while let Some(next) = self.next_event_tick() {
            if next > max_tick {
                break;
            }
            cycles += self.run_through(next)?.len();
        }
        Ok(cycles)
    }

    /// Earliest tick `>= now()` at which a cycle can change state
    pub fn next_event_tick(&self) -> Option<Tick> {
        let now = self.now();
        let admission_pending = self.state.queued_count() > 0 && self.pool.free_count() > 0;
        [
            admission_pending.then_some(now),
            self.feed.next_arrival_tick().map(|t| t.max(now)),
            self.pool.next_completion().map(|t| t.max(now)),
            self.monitor.next_wake(&self.state, now),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Inject an arrival after construction
    ///
    /// An arrival tick already in the past is ingested at the next cycle;
    /// its deadline is honored as given.
    pub fn submit(&mut self, spec: &ArrivalSpec) -> Result<PatientId, SchedulerError> {
        let id = self.feed.submit(spec)?;
        debug!(patient = id, tier = %spec.tier, arrival = spec.arrival, "arrival submitted");
        Ok(id)
    }

    /// The patient the next admission would pick at `now`
    pub fn select_candidate(&self, now: Tick) -> Option<PatientId> {
        self.state
            .queued_patients()
            .min_by_key(|p| p.admission_key(now))
            .map(Patient::id)
    }

    // ========================================================================
    // Decision cycle
    // ========================================================================

    fn run_cycle(&mut self) -> Result<TickResult, SchedulerError> {
        let now = self.now();
        let mut result = TickResult {
            tick: now,
            ..TickResult::default()
        };

        // STEP 1: COMPLETIONS
        for completion in self.pool.due_completions(now) {
            let patient = self.pool.complete(completion)?;
            self.state.remove_served(patient, completion.unit)?;
            info!(patient, unit = completion.unit, tick = now, "patient served");
            self.emit(Event::Served {
                tick: now,
                patient_id: patient,
                unit: completion.unit,
            });
            result.num_served += 1;
        }

        // STEP 2: ARRIVALS
        for patient in self.feed.due(now) {
            let event = Event::Arrival {
                tick: now,
                patient_id: patient.id(),
                tier: patient.tier(),
                deadline: patient.deadline(),
            };
            debug!(patient = patient.id(), tier = %patient.tier(), tick = now, "patient arrived");
            self.state.enqueue(patient)?;
            self.emit(event);
            result.num_arrivals += 1;
        }

        // STEP 3: ESCALATION
        if self.monitor.is_due(now) {
            for outcome in self.monitor.run_pass(&mut self.state, now)? {
                match outcome {
                    EscalationOutcome::Promoted {
                        patient,
                        from,
                        to,
                        deadline,
                    } => {
                        warn!(patient, %from, %to, tick = now, "patient escalated");
                        self.emit(Event::Promoted {
                            tick: now,
                            patient_id: patient,
                            from,
                            to,
                            deadline,
                        });
                        result.num_promotions += 1;
                    }
                    EscalationOutcome::Lost {
                        patient,
                        tier,
                        reason,
                    } => {
                        warn!(patient, %tier, ?reason, tick = now, "patient lost");
                        self.emit(Event::Lost {
                            tick: now,
                            patient_id: patient,
                            tier,
                            reason,
                        });
                        result.num_lost += 1;
                    }
                }
            }
        }

        // STEP 4: ADMISSION
        while let Some(candidate) = self.select_candidate(now) {
            let Some(unit) = self.pool.try_acquire() else {
                break;
            };
            self.admit(candidate, unit, now)?;
            result.num_admitted += 1;
        }

        if cfg!(debug_assertions) {
            self.check_invariants()?;
        }

        if result != (TickResult { tick: now, ..TickResult::default() }) {
            debug!(
                tick = now,
                arrivals = result.num_arrivals,
                admitted = result.num_admitted,
                served = result.num_served,
                lost = result.num_lost,
                queued = self.state.queued_count(),
                "decision cycle"
            );
        }
        Ok(result)
    }

    fn admit(&mut self, id: PatientId, unit: usize, now: Tick) -> Result<(), SchedulerError> {
        let patient = self.state.admit(id, unit)?;
        let tier = patient.tier();
        let completes_at = now.saturating_add(patient.service_duration());
        let urgency = patient.urgency(now);

        self.pool.occupy(unit, id, completes_at)?;
        debug!(patient = id, unit, urgency, completes_at, "patient admitted");
        self.emit(Event::Admitted {
            tick: now,
            patient_id: id,
            tier,
            unit,
            completes_at,
        });
        Ok(())
    }

    fn emit(&mut self, event: Event) {
        self.sink.record(&event);
        self.event_log.log(event);
    }

    /// Cross-check queues, arena and room occupancy
    pub fn check_invariants(&self) -> Result<(), ConsistencyViolation> {
        let result = self.check_occupancy();
        if let Err(violation) = &result {
            error!(%violation, tick = self.now(), "scheduler invariant breached");
        }
        result
    }

    fn check_occupancy(&self) -> Result<(), ConsistencyViolation> {
        self.state.check_invariants()?;

        let mut admitted = 0;
        for unit in self.pool.units() {
            if let Some(patient) = unit.occupant() {
                admitted += 1;
                if self.state.location(patient) != Some(Location::Admitted { unit: unit.index }) {
                    return Err(ConsistencyViolation::MultipleLocations { patient });
                }
            }
        }
        let in_treatment = self.state.live_count() - self.state.queued_count();
        if in_treatment != admitted {
            return Err(ConsistencyViolation::OccupancyMismatch {
                in_treatment,
                occupied: admitted,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tier;

    fn spec(tier: Tier, arrival: Tick, duration: Tick, deadline: Tick) -> ArrivalSpec {
        ArrivalSpec::new(tier, arrival)
            .with_service_duration(duration)
            .with_deadline(deadline)
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut dispatcher = Dispatcher::new(SchedulerConfig::new(1, Vec::new())).unwrap();
        let result = dispatcher.tick().unwrap();
        assert_eq!(result.tick, 0);
        assert_eq!(dispatcher.now(), 1);
    }

    #[test]
    fn test_run_through_matches_tick_by_tick() {
        let arrivals = vec![
            spec(Tier::Low, 0, 4, 30),
            spec(Tier::High, 1, 2, 6),
            spec(Tier::Medium, 1, 3, 7),
            spec(Tier::Low, 9, 2, 11),
        ];
        let mut stepped = Dispatcher::new(SchedulerConfig::new(1, arrivals.clone())).unwrap();
        for _ in 0..60 {
            stepped.tick().unwrap();
        }
        let mut jumped = Dispatcher::new(SchedulerConfig::new(1, arrivals)).unwrap();
        jumped.run_through(59).unwrap();

        assert_eq!(stepped.event_log().events(), jumped.event_log().events());
        assert_eq!(jumped.now(), 60);
    }

    #[test]
    fn test_candidate_prefers_lowest_urgency_across_tiers() {
        // Low tier but tighter slack beats a High tier patient with more slack
        let arrivals = vec![spec(Tier::High, 0, 2, 10), spec(Tier::Low, 0, 5, 8)];
        let mut dispatcher = Dispatcher::new(SchedulerConfig::new(1, arrivals)).unwrap();
        dispatcher.tick().unwrap();

        let admitted = dispatcher.event_log().events_of_type("Admitted");
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].patient_id(), 2);
    }

    #[test]
    fn test_urgency_tie_breaks_by_arrival_then_id() {
        let arrivals = vec![
            spec(Tier::Low, 1, 1, 10).with_id(9),
            spec(Tier::Low, 0, 1, 9).with_id(5),
            spec(Tier::Low, 1, 1, 10).with_id(3),
        ];
        let mut dispatcher = Dispatcher::new(SchedulerConfig::new(1, arrivals)).unwrap();
        dispatcher.run_through(1).unwrap();
        // Tick 0: only 5 present. Tick 1: 3 and 9 tie on (urgency, arrival), 3 wins.
        assert_eq!(dispatcher.select_candidate(1), Some(9));
        let admitted: Vec<_> = dispatcher
            .event_log()
            .events_of_type("Admitted")
            .iter()
            .map(|e| e.patient_id())
            .collect();
        assert_eq!(admitted, vec![5, 3]);
    }

    #[test]
    fn test_run_through_max_tick_saturates() {
        let mut dispatcher = Dispatcher::new(SchedulerConfig::new(1, Vec::new())).unwrap();
        assert!(dispatcher.run_through(Tick::MAX).unwrap().is_empty());
        assert_eq!(dispatcher.now(), Tick::MAX);
    }

    #[test]
    fn test_submit_after_start() {
        let mut dispatcher = Dispatcher::new(SchedulerConfig::new(1, Vec::new())).unwrap();
        dispatcher.run_through(4).unwrap();
        let id = dispatcher
            .submit(&ArrivalSpec::new(Tier::High, 5))
            .unwrap();
        assert_eq!(dispatcher.next_event_tick(), Some(5));
        dispatcher.run_to_completion(100).unwrap();
        assert_eq!(dispatcher.sink().served, 1);
        assert_eq!(dispatcher.event_log().events_for_patient(id).len(), 3);
    }
}
