//! Patient model
//!
//! A patient is one admission request. Each patient has:
//! - A stable id
//! - Arrival tick and absolute deadline tick
//! - Service duration (ticks of room time once admitted)
//! - A triage tier that can only escalate
//!
//! Urgency is derived, never stored: `deadline - now - service_duration`.
//! Lower urgency means more urgent; negative urgency means the patient can
//! no longer be fully treated before its deadline.

use crate::core::Tick;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable patient identifier
pub type PatientId = u64;

/// Triage tier (color code)
///
/// Ordered from least to most urgent. A patient only ever moves up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[serde(alias = "green")]
    Low,
    #[serde(alias = "orange")]
    Medium,
    #[serde(alias = "red")]
    High,
}

impl Tier {
    /// All tiers, least urgent first
    pub const ALL: [Tier; 3] = [Tier::Low, Tier::Medium, Tier::High];

    /// Number of tiers
    pub const COUNT: usize = 3;

    /// Position in [`Tier::ALL`]
    pub fn index(self) -> usize {
        match self {
            Tier::Low => 0,
            Tier::Medium => 1,
            Tier::High => 2,
        }
    }

    /// Next more urgent tier, or `None` for the terminal tier
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Low => Some(Tier::Medium),
            Tier::Medium => Some(Tier::High),
            Tier::High => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
        };
        f.write_str(name)
    }
}

/// A patient waiting for, or occupying, a treatment room
///
/// # Example
/// ```
/// use triage_scheduler_core::models::{Patient, Tier};
///
/// let patient = Patient::new(1, Tier::Medium, 2, 3, 9);
/// assert_eq!(patient.urgency(2), 4);
/// assert_eq!(patient.urgency(7), -1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    id: PatientId,
    tier: Tier,
    arrival_time: Tick,
    service_duration: Tick,
    deadline: Tick,
    /// Tick the current tolerance window opened: arrival, then each promotion
    window_start: Tick,
    promotions: u8,
}

impl Patient {
    /// Create a new patient
    ///
    /// # Panics
    /// Panics if `deadline < arrival_time`. Configuration loading rejects
    /// such entries before a patient is ever built.
    pub fn new(
        id: PatientId,
        tier: Tier,
        arrival_time: Tick,
        service_duration: Tick,
        deadline: Tick,
    ) -> Self {
        assert!(
            deadline >= arrival_time,
            "patient {id}: deadline {deadline} precedes arrival {arrival_time}"
        );
        Self {
            id,
            tier,
            arrival_time,
            service_duration,
            deadline,
            window_start: arrival_time,
            promotions: 0,
        }
    }

    pub fn id(&self) -> PatientId {
        self.id
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn arrival_time(&self) -> Tick {
        self.arrival_time
    }

    pub fn service_duration(&self) -> Tick {
        self.service_duration
    }

    pub fn deadline(&self) -> Tick {
        self.deadline
    }

    /// Number of tier promotions so far
    pub fn promotions(&self) -> u8 {
        self.promotions
    }

    /// Slack left at `now`: `deadline - now - service_duration`
    pub fn urgency(&self, now: Tick) -> i64 {
        self.deadline as i64 - now as i64 - self.service_duration as i64
    }

    /// Tick the current tolerance window opened
    pub fn window_start(&self) -> Tick {
        self.window_start
    }

    /// First tick at which urgency becomes negative
    pub fn escalation_boundary(&self) -> Tick {
        self.deadline
            .saturating_add(1)
            .saturating_sub(self.service_duration)
    }

    /// Whether the patient can no longer be saved by promotion at `now`
    ///
    /// True once `now` is past the deadline, or when the window opened with
    /// its deadline already reached (a patient arriving at or after it).
    pub fn is_expired(&self, now: Tick) -> bool {
        now > self.deadline || self.deadline <= self.window_start
    }

    /// Ordering key for admission: lowest wins
    pub fn admission_key(&self, now: Tick) -> (i64, Tick, PatientId) {
        (self.urgency(now), self.arrival_time, self.id)
    }

    /// Move up one tier and reopen the tolerance window at `now`
    ///
    /// Returns the new tier, or `None` when already terminal (no change).
    pub fn promote(&mut self, now: Tick, tolerance: Tick) -> Option<Tier> {
        let next = self.tier.next()?;
        self.tier = next;
        self.deadline = now
            .saturating_add(tolerance)
            .saturating_add(self.service_duration);
        self.window_start = now;
        self.promotions = self.promotions.saturating_add(1);
        Some(next)
    }

    /// Rebuild a patient from checkpointed fields
    pub(crate) fn from_snapshot(
        id: PatientId,
        tier: Tier,
        arrival_time: Tick,
        service_duration: Tick,
        deadline: Tick,
        window_start: Tick,
        promotions: u8,
    ) -> Self {
        Self {
            id,
            tier,
            arrival_time,
            service_duration,
            deadline,
            window_start,
            promotions,
        }
    }
}
