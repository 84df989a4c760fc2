//! Statistics sink
//!
//! The dispatcher never keeps counters of its own: it hands every event to a
//! [`StatisticsSink`]. [`Statistics`] is the counting sink used by default.

use crate::core::Tick;
use crate::models::{Event, LostReason, PatientId};
use std::collections::HashMap;

/// Receiver of scheduler events
pub trait StatisticsSink {
    fn record(&mut self, event: &Event);
}

/// Cumulative counters over the event stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub arrivals: usize,
    pub promotions: usize,
    pub admitted: usize,
    pub served: usize,
    pub lost_expired: usize,
    pub lost_terminal: usize,

    /// Sum of (admission tick - arrival tick) over admitted patients
    pub total_wait: Tick,

    /// Longest single wait before admission
    pub max_wait: Tick,

    /// Patients currently being treated
    pub in_treatment: usize,

    /// Highest simultaneous treatment count seen
    pub peak_in_treatment: usize,

    arrival_ticks: HashMap<PatientId, Tick>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lost(&self) -> usize {
        self.lost_expired + self.lost_terminal
    }

    /// Mean wait of admitted patients, if any were admitted
    pub fn mean_wait(&self) -> Option<f64> {
        if self.admitted == 0 {
            None
        } else {
            Some(self.total_wait as f64 / self.admitted as f64)
        }
    }
}

impl StatisticsSink for Statistics {
    fn record(&mut self, event: &Event) {
        match event {
            Event::Arrival {
                tick, patient_id, ..
            } => {
                self.arrivals += 1;
                self.arrival_ticks.insert(*patient_id, *tick);
            }
            Event::Promoted { .. } => self.promotions += 1,
            Event::Admitted {
                tick, patient_id, ..
            } => {
                self.admitted += 1;
                self.in_treatment += 1;
                self.peak_in_treatment = self.peak_in_treatment.max(self.in_treatment);
                if let Some(arrived) = self.arrival_ticks.remove(patient_id) {
                    let wait = tick.saturating_sub(arrived);
                    self.total_wait += wait;
                    self.max_wait = self.max_wait.max(wait);
                }
            }
            Event::Served { .. } => {
                self.served += 1;
                self.in_treatment = self.in_treatment.saturating_sub(1);
            }
            Event::Lost {
                patient_id, reason, ..
            } => {
                self.arrival_ticks.remove(patient_id);
                match reason {
                    LostReason::Expired => self.lost_expired += 1,
                    LostReason::TerminalEscalation => self.lost_terminal += 1,
                }
            }
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatisticsSink for NullSink {
    fn record(&mut self, _event: &Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tier;

    #[test]
    fn test_counts_and_waits() {
        let mut stats = Statistics::new();
        let events = [
            Event::Arrival { tick: 2, patient_id: 1, tier: Tier::Low, deadline: 20 },
            Event::Arrival { tick: 3, patient_id: 2, tier: Tier::High, deadline: 9 },
            Event::Admitted { tick: 3, patient_id: 2, tier: Tier::High, unit: 0, completes_at: 8 },
            Event::Admitted { tick: 6, patient_id: 1, tier: Tier::Low, unit: 1, completes_at: 9 },
            Event::Served { tick: 8, patient_id: 2, unit: 0 },
            Event::Arrival { tick: 8, patient_id: 3, tier: Tier::High, deadline: 8 },
            Event::Lost { tick: 8, patient_id: 3, tier: Tier::High, reason: LostReason::Expired },
        ];
        for event in &events {
            stats.record(event);
        }

        assert_eq!(stats.arrivals, 3);
        assert_eq!(stats.admitted, 2);
        assert_eq!(stats.served, 1);
        assert_eq!(stats.lost(), 1);
        assert_eq!(stats.lost_expired, 1);
        assert_eq!(stats.total_wait, 4);
        assert_eq!(stats.max_wait, 4);
        assert_eq!(stats.mean_wait(), Some(2.0));
        assert_eq!(stats.in_treatment, 1);
        assert_eq!(stats.peak_in_treatment, 2);
    }
}
