//! Resource pool: the treatment rooms
//!
//! A fixed number of interchangeable units. Each unit is either free or
//! occupied by exactly one patient until its scheduled completion tick.
//!
//! # Critical Invariants
//!
//! 1. **Fixed capacity**: exactly `capacity` units exist for the pool's lifetime
//! 2. **Single occupant**: a unit never holds two patients
//! 3. **No double free**: releasing a free unit is a [`ConsistencyViolation`]
//! 4. **Typed completions**: every occupation schedules one
//!    [`CompletionEvent`] naming its unit and patient
//!
//! # Example
//!
//! ```rust
//! use triage_scheduler_core::pool::ResourcePool;
//!
//! let mut pool = ResourcePool::new(2);
//! let unit = pool.try_acquire().unwrap();
//! pool.occupy(unit, 42, 5).unwrap();
//! assert_eq!(pool.occupied_count(), 1);
//!
//! let done = pool.due_completions(5);
//! assert_eq!(done.len(), 1);
//! assert_eq!(pool.complete(done[0]).unwrap(), 42);
//! assert_eq!(pool.occupied_count(), 0);
//! ```

use crate::core::{Tick, TimerQueue};
use crate::models::{ConsistencyViolation, PatientId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// State of one room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    Free,
    Occupied { patient: PatientId, completes_at: Tick },
}

/// One room of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUnit {
    pub index: usize,
    pub state: UnitState,
}

impl ResourceUnit {
    pub fn is_free(&self) -> bool {
        matches!(self.state, UnitState::Free)
    }

    pub fn occupant(&self) -> Option<PatientId> {
        match self.state {
            UnitState::Free => None,
            UnitState::Occupied { patient, .. } => Some(patient),
        }
    }
}

/// Deferred completion of a treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub completes_at: Tick,
    pub unit: usize,
    pub patient: PatientId,
}

/// Fixed set of rooms plus their pending completions
#[derive(Debug, Clone)]
pub struct ResourcePool {
    units: Vec<ResourceUnit>,
    free: BTreeSet<usize>,
    completions: TimerQueue<CompletionEvent>,
    peak_occupied: usize,
}

impl ResourcePool {
    /// Create a pool of `capacity` free units
    ///
    /// # Panics
    /// Panics if `capacity` is zero; configuration validation rejects that
    /// case before a pool is built.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            units: (0..capacity)
                .map(|index| ResourceUnit {
                    index,
                    state: UnitState::Free,
                })
                .collect(),
            free: (0..capacity).collect(),
            completions: TimerQueue::new(),
            peak_occupied: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.units.len()
    }

    pub fn units(&self) -> &[ResourceUnit] {
        &self.units
    }

    pub fn unit(&self, index: usize) -> Option<&ResourceUnit> {
        self.units.get(index)
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.units.len() - self.free.len()
    }

    /// Highest simultaneous occupancy seen so far
    pub fn peak_occupied(&self) -> usize {
        self.peak_occupied
    }

    /// Lowest-index free unit, if any. Does not change state.
    pub fn try_acquire(&self) -> Option<usize> {
        self.free.iter().next().copied()
    }

    /// Mark `unit` busy until `completes_at` and schedule its completion
    pub fn occupy(
        &mut self,
        unit: usize,
        patient: PatientId,
        completes_at: Tick,
    ) -> Result<(), ConsistencyViolation> {
        let capacity = self.capacity();
        let slot = self
            .units
            .get_mut(unit)
            .ok_or(ConsistencyViolation::UnknownUnit { unit, capacity })?;
        if let UnitState::Occupied { patient: occupant, .. } = slot.state {
            return Err(ConsistencyViolation::UnitAlreadyOccupied { unit, occupant });
        }

        slot.state = UnitState::Occupied {
            patient,
            completes_at,
        };
        self.free.remove(&unit);
        self.peak_occupied = self.peak_occupied.max(self.occupied_count());
        self.completions.schedule(
            completes_at,
            CompletionEvent {
                completes_at,
                unit,
                patient,
            },
        );
        Ok(())
    }

    /// Mark `unit` free again, returning the patient it held
    pub fn release(&mut self, unit: usize) -> Result<PatientId, ConsistencyViolation> {
        let capacity = self.capacity();
        let slot = self
            .units
            .get_mut(unit)
            .ok_or(ConsistencyViolation::UnknownUnit { unit, capacity })?;
        match slot.state {
            UnitState::Free => Err(ConsistencyViolation::ReleaseOfFreeUnit { unit }),
            UnitState::Occupied { patient, .. } => {
                slot.state = UnitState::Free;
                self.free.insert(unit);
                Ok(patient)
            }
        }
    }

    /// Pop completions scheduled at or before `now`, in `(tick, unit)` order
    pub fn due_completions(&mut self, now: Tick) -> Vec<CompletionEvent> {
        let mut due = self.completions.pop_due(now);
        due.sort_by_key(|c| (c.completes_at, c.unit));
        due
    }

    /// Tick of the next pending completion
    pub fn next_completion(&self) -> Option<Tick> {
        self.completions.next_due()
    }

    /// Apply a completion: the unit must still hold the event's patient
    pub fn complete(&mut self, event: CompletionEvent) -> Result<PatientId, ConsistencyViolation> {
        let occupant = self.unit(event.unit).and_then(ResourceUnit::occupant);
        if occupant != Some(event.patient) {
            return Err(ConsistencyViolation::CompletionMismatch {
                unit: event.unit,
                patient: event.patient,
                occupant,
            });
        }
        self.release(event.unit)
    }
}
