//! Scheduler State
//!
//! Holds every live patient and the tier queues.
//!
//! # Critical Invariants
//!
//! 1. **Arena ownership**: a live patient is stored exactly once, keyed by id
//! 2. **Exclusive location**: a patient is queued in one tier, or admitted to
//!    one room, never both
//! 3. **Queue validity**: every queued id exists in the arena and its
//!    recorded location names that queue
//! 4. **No resurrection**: served and lost patients are removed and their
//!    ids are never accepted again

use crate::core::Tick;
use crate::models::patient::{Patient, PatientId, Tier};
use crate::models::queue::TierQueue;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Breach of a core invariant. Always a logic bug, never a domain outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsistencyViolation {
    #[error("release of unit {unit} which is already free")]
    ReleaseOfFreeUnit { unit: usize },

    #[error("unit {unit} is already occupied by patient {occupant}")]
    UnitAlreadyOccupied { unit: usize, occupant: PatientId },

    #[error("unit {unit} does not exist (capacity {capacity})")]
    UnknownUnit { unit: usize, capacity: usize },

    #[error("completion for patient {patient} on unit {unit}, but the unit holds {occupant:?}")]
    CompletionMismatch {
        unit: usize,
        patient: PatientId,
        occupant: Option<PatientId>,
    },

    #[error("patient {patient} is already present in live state")]
    DuplicatePatient { patient: PatientId },

    #[error("patient {patient} was already discharged and cannot reappear")]
    DischargedPatient { patient: PatientId },

    #[error("patient {patient} is not in the expected location")]
    UnknownPatient { patient: PatientId },

    #[error("patient {patient} found in more than one structure")]
    MultipleLocations { patient: PatientId },

    #[error("{in_treatment} patients marked in treatment but {occupied} units occupied")]
    OccupancyMismatch { in_treatment: usize, occupied: usize },
}

/// Where a live patient currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Queued(Tier),
    Admitted { unit: usize },
}

/// Complete live state: patient arena plus the tier queues
///
/// # Example
///
/// ```rust
/// use triage_scheduler_core::models::{Patient, TriageState, Tier};
///
/// let mut state = TriageState::new();
/// state.enqueue(Patient::new(1, Tier::Low, 0, 3, 10)).unwrap();
/// assert_eq!(state.queued_count(), 1);
/// assert_eq!(state.queue(Tier::Low).len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TriageState {
    patients: BTreeMap<PatientId, Patient>,
    locations: HashMap<PatientId, Location>,
    queues: [TierQueue; Tier::COUNT],
    discharged: HashSet<PatientId>,
}

impl TriageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patient(&self, id: PatientId) -> Option<&Patient> {
        self.patients.get(&id)
    }

    pub fn location(&self, id: PatientId) -> Option<Location> {
        self.locations.get(&id).copied()
    }

    pub fn queue(&self, tier: Tier) -> &TierQueue {
        &self.queues[tier.index()]
    }

    /// Total patients waiting across all tiers
    pub fn queued_count(&self) -> usize {
        self.queues.iter().map(TierQueue::len).sum()
    }

    /// Live patients (queued or admitted)
    pub fn live_count(&self) -> usize {
        self.patients.len()
    }

    /// Queued ids, most urgent tier first, FIFO within a tier
    pub fn queued_ids(&self) -> Vec<PatientId> {
        Tier::ALL
            .iter()
            .rev()
            .flat_map(|tier| self.queues[tier.index()].iter())
            .collect()
    }

    /// Queued patients, most urgent tier first, FIFO within a tier
    pub fn queued_patients(&self) -> impl Iterator<Item = &Patient> + '_ {
        Tier::ALL
            .iter()
            .rev()
            .flat_map(move |tier| self.queues[tier.index()].iter())
            .filter_map(move |id| self.patients.get(&id))
    }

    /// Insert a newly arrived patient at the tail of its tier queue
    pub fn enqueue(&mut self, patient: Patient) -> Result<(), ConsistencyViolation> {
        let id = patient.id();
        if self.discharged.contains(&id) {
            return Err(ConsistencyViolation::DischargedPatient { patient: id });
        }
        if self.patients.contains_key(&id) {
            return Err(ConsistencyViolation::DuplicatePatient { patient: id });
        }
        let tier = patient.tier();
        if !self.queues[tier.index()].push_back(id) {
            return Err(ConsistencyViolation::MultipleLocations { patient: id });
        }
        self.locations.insert(id, Location::Queued(tier));
        self.patients.insert(id, patient);
        Ok(())
    }

    /// Promote a queued patient and move it to the tail of its new queue
    ///
    /// Returns `(from, to)` tiers, or `None` if the patient is terminal.
    pub fn promote(
        &mut self,
        id: PatientId,
        now: Tick,
        tolerance_of: impl Fn(Tier) -> Tick,
    ) -> Result<Option<(Tier, Tier)>, ConsistencyViolation> {
        let from = self.queued_tier(id)?;
        let patient = self
            .patients
            .get_mut(&id)
            .ok_or(ConsistencyViolation::UnknownPatient { patient: id })?;
        let to = match from.next() {
            Some(next) => next,
            None => return Ok(None),
        };
        patient.promote(now, tolerance_of(to));

        self.queues[from.index()].remove(id);
        if !self.queues[to.index()].push_back(id) {
            return Err(ConsistencyViolation::MultipleLocations { patient: id });
        }
        self.locations.insert(id, Location::Queued(to));
        Ok(Some((from, to)))
    }

    /// Remove a queued patient that died while waiting
    pub fn remove_lost(&mut self, id: PatientId) -> Result<Patient, ConsistencyViolation> {
        let tier = self.queued_tier(id)?;
        self.queues[tier.index()].remove(id);
        self.discharge(id)
    }

    /// Move a queued patient into a room
    pub fn admit(&mut self, id: PatientId, unit: usize) -> Result<&Patient, ConsistencyViolation> {
        let tier = self.queued_tier(id)?;
        self.queues[tier.index()].remove(id);
        self.locations.insert(id, Location::Admitted { unit });
        self.patients
            .get(&id)
            .ok_or(ConsistencyViolation::UnknownPatient { patient: id })
    }

    /// Remove an admitted patient whose treatment completed
    pub fn remove_served(&mut self, id: PatientId, unit: usize) -> Result<Patient, ConsistencyViolation> {
        match self.locations.get(&id) {
            Some(Location::Admitted { unit: held }) if *held == unit => self.discharge(id),
            _ => Err(ConsistencyViolation::UnknownPatient { patient: id }),
        }
    }

    /// Re-seat an admitted patient (checkpoint restore)
    pub(crate) fn restore_admitted(
        &mut self,
        patient: Patient,
        unit: usize,
    ) -> Result<(), ConsistencyViolation> {
        let id = patient.id();
        if self.patients.contains_key(&id) {
            return Err(ConsistencyViolation::DuplicatePatient { patient: id });
        }
        self.locations.insert(id, Location::Admitted { unit });
        self.patients.insert(id, patient);
        Ok(())
    }

    /// Full cross-check of arena, locations and queues
    pub fn check_invariants(&self) -> Result<(), ConsistencyViolation> {
        let mut seen = HashSet::new();
        for tier in Tier::ALL {
            for id in self.queues[tier.index()].iter() {
                if !seen.insert(id) {
                    return Err(ConsistencyViolation::MultipleLocations { patient: id });
                }
                let patient = self
                    .patients
                    .get(&id)
                    .ok_or(ConsistencyViolation::UnknownPatient { patient: id })?;
                if patient.tier() != tier || self.location(id) != Some(Location::Queued(tier)) {
                    return Err(ConsistencyViolation::MultipleLocations { patient: id });
                }
            }
        }
        for (id, location) in &self.locations {
            if !self.patients.contains_key(id) || self.discharged.contains(id) {
                return Err(ConsistencyViolation::UnknownPatient { patient: *id });
            }
            match location {
                Location::Queued(tier) if !self.queues[tier.index()].contains(*id) => {
                    return Err(ConsistencyViolation::UnknownPatient { patient: *id });
                }
                Location::Admitted { .. } if seen.contains(id) => {
                    return Err(ConsistencyViolation::MultipleLocations { patient: *id });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn queued_tier(&self, id: PatientId) -> Result<Tier, ConsistencyViolation> {
        match self.locations.get(&id) {
            Some(Location::Queued(tier)) => Ok(*tier),
            _ => Err(ConsistencyViolation::UnknownPatient { patient: id }),
        }
    }

    fn discharge(&mut self, id: PatientId) -> Result<Patient, ConsistencyViolation> {
        self.locations.remove(&id);
        let patient = self
            .patients
            .remove(&id)
            .ok_or(ConsistencyViolation::UnknownPatient { patient: id })?;
        self.discharged.insert(id);
        Ok(patient)
    }
}
