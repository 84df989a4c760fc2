//! Escalation monitor
//!
//! Recomputes the urgency of every queued patient and applies the triage
//! rules when it turns negative:
//!
//! ```text
//! urgency >= 0                        -> nothing
//! urgency <  0, expired               -> lost (Expired)
//! urgency <  0, tier below terminal   -> promote, reopen tolerance window
//! urgency <  0, terminal tier         -> lost (TerminalEscalation)
//! ```
//!
//! Expired means `now > deadline`, or a window that opened with its deadline
//! already reached. A patient whose urgency first turns negative exactly at
//! its deadline (service duration 1) is still promoted.
//!
//! The pass runs after arrivals and before admission in a decision cycle,
//! so admission never sees a stale urgency. A promotion leaves the patient with urgency equal
//! to the new tier's tolerance, which is positive, so a patient is promoted
//! at most once per pass.

use crate::core::Tick;
use crate::dispatcher::TierTable;
use crate::models::{ConsistencyViolation, LostReason, PatientId, Tier, TriageState};

/// What a pass did to one patient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationOutcome {
    Promoted {
        patient: PatientId,
        from: Tier,
        to: Tier,
        deadline: Tick,
    },
    Lost {
        patient: PatientId,
        tier: Tier,
        reason: LostReason,
    },
}

/// Applies the escalation rules on a fixed polling interval
#[derive(Debug, Clone)]
pub struct EscalationMonitor {
    tiers: TierTable,
    interval: Tick,
}

impl EscalationMonitor {
    /// # Panics
    /// Panics if `interval` is zero (rejected earlier by config validation).
    pub fn new(tiers: TierTable, interval: Tick) -> Self {
        assert!(interval > 0, "escalation interval must be positive");
        Self { tiers, interval }
    }

    pub fn interval(&self) -> Tick {
        self.interval
    }

    /// Whether a cycle at `now` runs the escalation pass
    pub fn is_due(&self, now: Tick) -> bool {
        now % self.interval == 0
    }

    /// Run one pass over every queued patient
    ///
    /// Patients are visited most urgent tier first, FIFO within a tier;
    /// outcomes are returned in that order.
    pub fn run_pass(
        &self,
        state: &mut TriageState,
        now: Tick,
    ) -> Result<Vec<EscalationOutcome>, ConsistencyViolation> {
        let mut outcomes = Vec::new();

        for id in state.queued_ids() {
            let patient = state
                .patient(id)
                .ok_or(ConsistencyViolation::UnknownPatient { patient: id })?;
            if patient.urgency(now) >= 0 {
                continue;
            }

            let tier = patient.tier();
            if patient.is_expired(now) {
                state.remove_lost(id)?;
                outcomes.push(EscalationOutcome::Lost {
                    patient: id,
                    tier,
                    reason: LostReason::Expired,
                });
                continue;
            }

            let tiers = &self.tiers;
            match state.promote(id, now, |to| tiers.tolerance(to))? {
                Some((from, to)) => {
                    let deadline = state
                        .patient(id)
                        .map(|p| p.deadline())
                        .ok_or(ConsistencyViolation::UnknownPatient { patient: id })?;
                    outcomes.push(EscalationOutcome::Promoted {
                        patient: id,
                        from,
                        to,
                        deadline,
                    });
                }
                None => {
                    state.remove_lost(id)?;
                    outcomes.push(EscalationOutcome::Lost {
                        patient: id,
                        tier,
                        reason: LostReason::TerminalEscalation,
                    });
                }
            }
        }

        Ok(outcomes)
    }

    /// Earliest pass tick `>= now` at which some queued patient escalates
    pub fn next_wake(&self, state: &TriageState, now: Tick) -> Option<Tick> {
        state
            .queued_patients()
            .map(|p| p.escalation_boundary().max(now))
            .min()
            .map(|tick| tick.div_ceil(self.interval).saturating_mul(self.interval))
    }
}
