//! Event logging for replay, auditing and statistics.
//!
//! Every state change a patient goes through is captured as an [`Event`]:
//! - **Arrival**: patient enters a tier queue
//! - **Promoted**: escalation moved the patient to a more urgent tier
//! - **Admitted**: a room was assigned
//! - **Served**: treatment completed, room freed
//! - **Lost**: the patient died while queued
//!
//! Events are emitted to the statistics sink and appended to the
//! [`EventLog`] in the order they occur within a tick.
//!
//! # Example
//!
//! ```rust
//! use triage_scheduler_core::models::{Event, Tier};
//!
//! let event = Event::Admitted {
//!     tick: 2,
//!     patient_id: 7,
//!     tier: Tier::High,
//!     unit: 0,
//!     completes_at: 7,
//! };
//!
//! assert_eq!(event.tick(), 2);
//! assert_eq!(event.patient_id(), 7);
//! assert_eq!(event.event_type(), "Admitted");
//! ```

use crate::core::Tick;
use crate::models::patient::{PatientId, Tier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Why a patient was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LostReason {
    /// The absolute deadline elapsed while queued
    Expired,
    /// Urgency ran out while already in the terminal tier
    TerminalEscalation,
}

/// Scheduler event capturing a patient state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    Arrival {
        tick: Tick,
        patient_id: PatientId,
        tier: Tier,
        deadline: Tick,
    },

    /// Tier escalation; `deadline` is the reopened tolerance window
    Promoted {
        tick: Tick,
        patient_id: PatientId,
        from: Tier,
        to: Tier,
        deadline: Tick,
    },

    Admitted {
        tick: Tick,
        patient_id: PatientId,
        tier: Tier,
        unit: usize,
        completes_at: Tick,
    },

    Served {
        tick: Tick,
        patient_id: PatientId,
        unit: usize,
    },

    Lost {
        tick: Tick,
        patient_id: PatientId,
        tier: Tier,
        reason: LostReason,
    },
}

impl Event {
    /// Get the tick number when this event occurred
    pub fn tick(&self) -> Tick {
        match self {
            Event::Arrival { tick, .. }
            | Event::Promoted { tick, .. }
            | Event::Admitted { tick, .. }
            | Event::Served { tick, .. }
            | Event::Lost { tick, .. } => *tick,
        }
    }

    /// Patient the event is about
    pub fn patient_id(&self) -> PatientId {
        match self {
            Event::Arrival { patient_id, .. }
            | Event::Promoted { patient_id, .. }
            | Event::Admitted { patient_id, .. }
            | Event::Served { patient_id, .. }
            | Event::Lost { patient_id, .. } => *patient_id,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Arrival { .. } => "Arrival",
            Event::Promoted { .. } => "Promoted",
            Event::Admitted { .. } => "Admitted",
            Event::Served { .. } => "Served",
            Event::Lost { .. } => "Lost",
        }
    }
}

/// Event log for storing and querying scheduler events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events for a specific tick
    pub fn events_at_tick(&self, tick: Tick) -> Vec<&Event> {
        self.events.iter().filter(|e| e.tick() == tick).collect()
    }

    /// Get events of a specific type (see [`Event::event_type`])
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the history of one patient
    pub fn events_for_patient(&self, patient_id: PatientId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.patient_id() == patient_id)
            .collect()
    }

    /// SHA-256 over the JSON encoding of the whole event stream
    ///
    /// Two runs with identical event sequences produce identical digests.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for event in &self.events {
            // Event holds only integers and unit enums; encoding cannot fail.
            if let Ok(line) = serde_json::to_vec(event) {
                hasher.update(&line);
            }
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival(tick: Tick, patient_id: PatientId) -> Event {
        Event::Arrival {
            tick,
            patient_id,
            tier: Tier::Low,
            deadline: tick + 10,
        }
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.log(arrival(1, 1));
        log.log(Event::Admitted {
            tick: 1,
            patient_id: 1,
            tier: Tier::Low,
            unit: 0,
            completes_at: 4,
        });
        log.log(arrival(2, 2));
        log.log(Event::Served {
            tick: 4,
            patient_id: 1,
            unit: 0,
        });

        assert_eq!(log.len(), 4);
        assert_eq!(log.events_at_tick(1).len(), 2);
        assert_eq!(log.events_of_type("Arrival").len(), 2);
        assert_eq!(log.events_for_patient(1).len(), 3);
        assert_eq!(log.events_for_patient(2).len(), 1);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_digest_tracks_content_and_order() {
        let mut a = EventLog::new();
        let mut b = EventLog::new();
        a.log(arrival(1, 1));
        a.log(arrival(1, 2));
        b.log(arrival(1, 1));
        b.log(arrival(1, 2));
        assert_eq!(a.digest(), b.digest());

        let mut c = EventLog::new();
        c.log(arrival(1, 2));
        c.log(arrival(1, 1));
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn test_lost_event_serializes_reason() {
        let event = Event::Lost {
            tick: 3,
            patient_id: 9,
            tier: Tier::High,
            reason: LostReason::TerminalEscalation,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Lost\""));
        assert!(json.contains("terminal_escalation"));
    }
}
