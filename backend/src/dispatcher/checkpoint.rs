//! Checkpoint - Save/Restore Scheduler State
//!
//! Captures everything needed to resume a dispatcher at an arbitrary tick:
//! queued patients in queue order, room occupancy with completion ticks,
//! and arrivals not yet released.
//!
//! # Critical Invariants
//!
//! - **Determinism**: a restored dispatcher produces the same future events
//!   as an uninterrupted run
//! - **Queue Integrity**: no orphaned or duplicate patients after restore
//! - **Config Matching**: state can only be restored with the config it was
//!   taken under

use crate::arrivals::ArrivalFeed;
use crate::core::{ManualClock, Tick};
use crate::dispatcher::config::{ConfigError, SchedulerConfig};
use crate::dispatcher::engine::{Dispatcher, SchedulerError};
use crate::models::{Patient, PatientId, Tier, TriageState};
use crate::pool::UnitState;
use crate::stats::{Statistics, StatisticsSink};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete dispatcher state snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Tick the next cycle would run at
    pub current_tick: Tick,

    /// Queued patients: Low queue, then Medium, then High, FIFO within each
    pub queued: Vec<PatientSnapshot>,

    /// Occupied rooms
    pub admitted: Vec<AdmittedSnapshot>,

    /// Arrivals not yet released, in release order
    pub pending_arrivals: Vec<PatientSnapshot>,

    /// Every patient id handed out so far, ascending
    pub used_ids: Vec<PatientId>,

    /// SHA256 hash of the config (for validation)
    pub config_hash: String,
}

/// Patient state snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub id: PatientId,
    pub tier: Tier,
    pub arrival_time: Tick,
    pub service_duration: Tick,
    pub deadline: Tick,
    pub window_start: Tick,
    pub promotions: u8,
}

/// Occupied room snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedSnapshot {
    pub unit: usize,
    pub completes_at: Tick,
    pub patient: PatientSnapshot,
}

impl From<&Patient> for PatientSnapshot {
    fn from(patient: &Patient) -> Self {
        PatientSnapshot {
            id: patient.id(),
            tier: patient.tier(),
            arrival_time: patient.arrival_time(),
            service_duration: patient.service_duration(),
            deadline: patient.deadline(),
            window_start: patient.window_start(),
            promotions: patient.promotions(),
        }
    }
}

impl From<PatientSnapshot> for Patient {
    fn from(snapshot: PatientSnapshot) -> Self {
        Patient::from_snapshot(
            snapshot.id,
            snapshot.tier,
            snapshot.arrival_time,
            snapshot.service_duration,
            snapshot.deadline,
            snapshot.window_start,
            snapshot.promotions,
        )
    }
}

impl StateSnapshot {
    /// SHA256 over the snapshot's JSON form
    pub fn state_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(sha256_hex(json.as_bytes()))
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// The config holds no maps, so its JSON form is already canonical.
pub fn compute_config_hash(config: &SchedulerConfig) -> Result<String, ConfigError> {
    let json = serde_json::to_string(config)?;
    Ok(sha256_hex(json.as_bytes()))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Save / Restore
// ============================================================================

impl<S: StatisticsSink> Dispatcher<S> {
    /// Capture the current state
    pub fn snapshot(&self) -> Result<StateSnapshot, ConfigError> {
        let state = self.state();
        let queued = Tier::ALL
            .iter()
            .flat_map(|tier| state.queue(*tier).iter())
            .filter_map(|id| state.patient(id))
            .map(PatientSnapshot::from)
            .collect();

        let admitted = self
            .pool()
            .units()
            .iter()
            .filter_map(|unit| match unit.state {
                UnitState::Free => None,
                UnitState::Occupied {
                    patient,
                    completes_at,
                } => state.patient(patient).map(|p| AdmittedSnapshot {
                    unit: unit.index,
                    completes_at,
                    patient: PatientSnapshot::from(p),
                }),
            })
            .collect();

        let mut used_ids: Vec<PatientId> = self.feed().used_ids().collect();
        used_ids.sort_unstable();

        Ok(StateSnapshot {
            current_tick: self.now(),
            queued,
            admitted,
            pending_arrivals: self.feed().pending().map(PatientSnapshot::from).collect(),
            used_ids,
            config_hash: compute_config_hash(self.config())?,
        })
    }

    /// Rebuild a dispatcher from a snapshot, reporting to `sink`
    ///
    /// The event log starts empty; the sink sees only events after restore.
    pub fn from_snapshot_with_sink(
        config: SchedulerConfig,
        snapshot: StateSnapshot,
        sink: S,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        if compute_config_hash(&config)? != snapshot.config_hash {
            return Err(ConfigError::ConfigMismatch.into());
        }

        let feed = ArrivalFeed::from_pending(
            snapshot.pending_arrivals.into_iter().map(Patient::from).collect(),
            snapshot.used_ids,
            &config.tiers,
        );
        let mut dispatcher = Dispatcher::assemble(
            config,
            ManualClock::starting_at(snapshot.current_tick),
            TriageState::new(),
            feed,
            sink,
        );

        for patient in snapshot.queued {
            dispatcher.state_mut().enqueue(patient.into())?;
        }
        for room in snapshot.admitted {
            let id = room.patient.id;
            dispatcher.state_mut().restore_admitted(room.patient.into(), room.unit)?;
            dispatcher.pool_mut().occupy(room.unit, id, room.completes_at)?;
        }

        dispatcher.check_invariants()?;
        Ok(dispatcher)
    }
}

impl Dispatcher<Statistics> {
    /// Rebuild a dispatcher from a snapshot with a fresh [`Statistics`] sink
    pub fn from_snapshot(config: SchedulerConfig, snapshot: StateSnapshot) -> Result<Self, SchedulerError> {
        Self::from_snapshot_with_sink(config, snapshot, Statistics::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrivals::ArrivalSpec;

    fn config() -> SchedulerConfig {
        SchedulerConfig::new(
            1,
            vec![
                ArrivalSpec::new(Tier::Low, 0).with_service_duration(4).with_deadline(20),
                ArrivalSpec::new(Tier::High, 1).with_service_duration(2).with_deadline(9),
                ArrivalSpec::new(Tier::Medium, 6),
            ],
        )
    }

    #[test]
    fn test_config_hash_is_stable_and_sensitive() {
        let a = compute_config_hash(&config()).unwrap();
        assert_eq!(a, compute_config_hash(&config()).unwrap());
        assert_eq!(a.len(), 64);

        let mut changed = config();
        changed.capacity = 2;
        assert_ne!(a, compute_config_hash(&changed).unwrap());
    }

    #[test]
    fn test_snapshot_captures_rooms_queues_and_pending() {
        let mut dispatcher = Dispatcher::new(config()).unwrap();
        dispatcher.run_through(1).unwrap();

        let snapshot = dispatcher.snapshot().unwrap();
        assert_eq!(snapshot.current_tick, 2);
        assert_eq!(snapshot.admitted.len(), 1);
        assert_eq!(snapshot.admitted[0].patient.id, 1);
        assert_eq!(snapshot.admitted[0].completes_at, 4);
        assert_eq!(snapshot.queued.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(snapshot.pending_arrivals.len(), 1);
        assert_eq!(snapshot.used_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_restore_rejects_other_config() {
        let dispatcher = Dispatcher::new(config()).unwrap();
        let snapshot = dispatcher.snapshot().unwrap();

        let mut other = config();
        other.escalation_interval = 2;
        let err = Dispatcher::from_snapshot(other, snapshot).err().unwrap();
        assert!(matches!(err, SchedulerError::Config(ConfigError::ConfigMismatch)));
    }

    #[test]
    fn test_restore_rejects_double_booked_room() {
        let mut dispatcher = Dispatcher::new(config()).unwrap();
        dispatcher.run_through(1).unwrap();
        let mut snapshot = dispatcher.snapshot().unwrap();

        let mut twin = snapshot.admitted[0].clone();
        twin.patient.id = 99;
        snapshot.admitted.push(twin);
        let err = Dispatcher::from_snapshot(config(), snapshot).err().unwrap();
        assert!(matches!(err, SchedulerError::Consistency(_)));
    }
}
