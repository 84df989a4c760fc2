//! Arrival feed: turns a static schedule into timed patient arrivals.
//!
//! # Key Principles
//!
//! 1. **Time order**: arrivals are released in non-decreasing arrival tick
//! 2. **Stability**: entries with equal ticks keep their input order
//! 3. **Defaults from the tier**: a missing service duration or deadline is
//!    derived from the tier table, the way a color code implies both
//! 4. **Validated up front**: a bad entry is a [`ConfigError`], never a
//!    runtime surprise
//!
//! # Example
//!
//! ```
//! use triage_scheduler_core::arrivals::{ArrivalFeed, ArrivalSpec};
//! use triage_scheduler_core::dispatcher::TierTable;
//! use triage_scheduler_core::models::Tier;
//!
//! let specs = vec![
//!     ArrivalSpec::new(Tier::High, 5),
//!     ArrivalSpec::new(Tier::Low, 2),
//! ];
//! let mut feed = ArrivalFeed::new(&specs, &TierTable::default()).unwrap();
//!
//! assert_eq!(feed.next_arrival_tick(), Some(2));
//! let due = feed.due(4);
//! assert_eq!(due.len(), 1);
//! assert_eq!(due[0].id(), 2);
//! ```

use crate::core::{Tick, MAX_TICK};
use crate::dispatcher::{ConfigError, TierTable};
use crate::models::{Patient, PatientId, Tier};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// One entry of the arrival schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalSpec {
    /// Explicit patient id; defaults to position in the schedule + 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PatientId>,

    pub tier: Tier,

    /// Tick at which the patient enters its tier queue
    pub arrival: Tick,

    /// Defaults to the tier's service duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_duration: Option<Tick>,

    /// Absolute deadline; defaults to `arrival + tolerance + service_duration`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Tick>,
}

impl ArrivalSpec {
    /// Entry relying on tier defaults for duration and deadline
    pub fn new(tier: Tier, arrival: Tick) -> Self {
        Self {
            id: None,
            tier,
            arrival,
            service_duration: None,
            deadline: None,
        }
    }

    pub fn with_id(mut self, id: PatientId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_service_duration(mut self, service_duration: Tick) -> Self {
        self.service_duration = Some(service_duration);
        self
    }

    pub fn with_deadline(mut self, deadline: Tick) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Build the patient this entry describes
    fn resolve(&self, index: usize, id: PatientId, tiers: &TierTable) -> Result<Patient, ConfigError> {
        let out_of_range = || ConfigError::TickOutOfRange {
            index,
            max: MAX_TICK,
        };
        let defaults = tiers.get(self.tier);
        let service_duration = self.service_duration.unwrap_or(defaults.service_duration);
        if service_duration == 0 {
            return Err(ConfigError::ZeroServiceDuration { index });
        }
        if self.arrival > MAX_TICK || service_duration > MAX_TICK {
            return Err(out_of_range());
        }
        let deadline = match self.deadline {
            Some(deadline) => deadline,
            None => self
                .arrival
                .checked_add(defaults.tolerance)
                .and_then(|t| t.checked_add(service_duration))
                .ok_or_else(out_of_range)?,
        };
        if deadline > MAX_TICK {
            return Err(out_of_range());
        }
        if deadline < self.arrival {
            return Err(ConfigError::DeadlineBeforeArrival {
                index,
                arrival: self.arrival,
                deadline,
            });
        }
        Ok(Patient::new(id, self.tier, self.arrival, service_duration, deadline))
    }
}

/// Resolve a whole schedule, checking ids are unique
pub(crate) fn resolve_all(specs: &[ArrivalSpec], tiers: &TierTable) -> Result<Vec<Patient>, ConfigError> {
    let mut seen = HashSet::new();
    let mut patients = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let id = spec.id.unwrap_or(index as PatientId + 1);
        if !seen.insert(id) {
            return Err(ConfigError::DuplicatePatientId { id });
        }
        patients.push(spec.resolve(index, id, tiers)?);
    }
    Ok(patients)
}

/// Pending arrivals in release order
#[derive(Debug, Clone)]
pub struct ArrivalFeed {
    pending: VecDeque<Patient>,
    tiers: TierTable,
    used_ids: HashSet<PatientId>,
    submitted: usize,
}

impl ArrivalFeed {
    /// Build a feed from a static schedule
    pub fn new(specs: &[ArrivalSpec], tiers: &TierTable) -> Result<Self, ConfigError> {
        let mut patients = resolve_all(specs, tiers)?;
        // Stable: equal arrival ticks keep input order.
        patients.sort_by_key(Patient::arrival_time);
        Ok(Self {
            used_ids: patients.iter().map(Patient::id).collect(),
            submitted: specs.len(),
            pending: patients.into(),
            tiers: *tiers,
        })
    }

    /// Rebuild a feed from already-resolved patients (checkpoint restore)
    pub(crate) fn from_pending(
        pending: Vec<Patient>,
        used_ids: impl IntoIterator<Item = PatientId>,
        tiers: &TierTable,
    ) -> Self {
        let mut used_ids: HashSet<PatientId> = used_ids.into_iter().collect();
        used_ids.extend(pending.iter().map(Patient::id));
        Self {
            submitted: used_ids.len(),
            pending: pending.into(),
            tiers: *tiers,
            used_ids,
        }
    }

    /// Add a late arrival, keeping release order
    ///
    /// Without an explicit id, the patient gets one past the largest id
    /// handed out so far.
    pub fn submit(&mut self, spec: &ArrivalSpec) -> Result<PatientId, ConfigError> {
        let id = match spec.id {
            Some(id) => id,
            None => self.used_ids.iter().max().map_or(1, |max| max + 1),
        };
        if self.used_ids.contains(&id) {
            return Err(ConfigError::DuplicatePatientId { id });
        }
        let patient = spec.resolve(self.submitted, id, &self.tiers)?;
        let position = self
            .pending
            .partition_point(|p| p.arrival_time() <= patient.arrival_time());
        self.pending.insert(position, patient);
        self.used_ids.insert(id);
        self.submitted += 1;
        Ok(id)
    }

    /// Drain every arrival with `arrival_time <= now`, in release order
    pub fn due(&mut self, now: Tick) -> Vec<Patient> {
        let count = self.pending.partition_point(|p| p.arrival_time() <= now);
        self.pending.drain(..count).collect()
    }

    /// Tick of the earliest pending arrival
    pub fn next_arrival_tick(&self) -> Option<Tick> {
        self.pending.front().map(Patient::arrival_time)
    }

    /// Arrivals not yet released
    pub fn pending(&self) -> impl Iterator<Item = &Patient> + '_ {
        self.pending.iter()
    }

    /// Every id ever handed out by this feed
    pub fn used_ids(&self) -> impl Iterator<Item = PatientId> + '_ {
        self.used_ids.iter().copied()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }
}
