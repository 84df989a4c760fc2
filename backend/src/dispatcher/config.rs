//! Scheduler configuration
//!
//! Everything needed to start a scheduler: room capacity, per-tier
//! tolerance windows and default service durations, the escalation polling
//! interval and the static arrival schedule. Loaded from JSON with serde;
//! invalid input is rejected before any state is built.

use crate::arrivals::ArrivalSpec;
use crate::core::{Tick, MAX_TICK};
use crate::models::{PatientId, Tier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration rejected at load time
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("capacity must be at least 1")]
    ZeroCapacity,

    #[error("escalation_interval must be at least 1")]
    ZeroEscalationInterval,

    #[error("tier {tier} has a zero tolerance window")]
    ZeroTolerance { tier: Tier },

    #[error("arrival #{index}: service_duration must be at least 1")]
    ZeroServiceDuration { index: usize },

    #[error("arrival #{index}: deadline {deadline} precedes arrival {arrival}")]
    DeadlineBeforeArrival {
        index: usize,
        arrival: Tick,
        deadline: Tick,
    },

    #[error("arrival #{index}: tick values must not exceed {max}")]
    TickOutOfRange { index: usize, max: Tick },

    #[error("tier {tier}: tolerance and service_duration must not exceed {max}")]
    TierOutOfRange { tier: Tier, max: Tick },

    #[error("escalation_interval must not exceed {max}")]
    EscalationIntervalOutOfRange { max: Tick },

    #[error("patient id {id} appears more than once")]
    DuplicatePatientId { id: PatientId },

    #[error("checkpoint was taken with a different configuration")]
    ConfigMismatch,

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-tier parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Ticks of slack a patient may lose in this tier before escalating
    pub tolerance: Tick,

    /// Service duration used when an arrival does not specify one
    pub service_duration: Tick,
}

/// Parameters for all three tiers
///
/// Defaults follow the color-code ward: green escalates after 10 ticks,
/// orange after 5, red dies after 3; treatments take 3, 4 and 5 ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    pub low: TierConfig,
    pub medium: TierConfig,
    pub high: TierConfig,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            low: TierConfig {
                tolerance: 10,
                service_duration: 3,
            },
            medium: TierConfig {
                tolerance: 5,
                service_duration: 4,
            },
            high: TierConfig {
                tolerance: 3,
                service_duration: 5,
            },
        }
    }
}

impl TierTable {
    pub fn get(&self, tier: Tier) -> &TierConfig {
        match tier {
            Tier::Low => &self.low,
            Tier::Medium => &self.medium,
            Tier::High => &self.high,
        }
    }

    pub fn tolerance(&self, tier: Tier) -> Tick {
        self.get(tier).tolerance
    }
}

fn default_escalation_interval() -> Tick {
    1
}

/// Complete scheduler configuration
///
/// # Example
///
/// ```rust
/// use triage_scheduler_core::dispatcher::SchedulerConfig;
///
/// let config = SchedulerConfig::from_json_str(r#"{
///     "capacity": 2,
///     "arrivals": [
///         { "tier": "red", "arrival": 3 },
///         { "tier": "medium", "arrival": 2, "service_duration": 3, "deadline": 9 }
///     ]
/// }"#).unwrap();
///
/// assert_eq!(config.capacity, 2);
/// assert_eq!(config.escalation_interval, 1);
/// assert_eq!(config.arrivals.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of rooms
    pub capacity: usize,

    /// Escalation runs on cycles whose tick is a multiple of this
    #[serde(default = "default_escalation_interval")]
    pub escalation_interval: Tick,

    #[serde(default)]
    pub tiers: TierTable,

    /// Static arrival schedule
    #[serde(default)]
    pub arrivals: Vec<ArrivalSpec>,
}

impl SchedulerConfig {
    /// Config with default tiers and the given schedule
    pub fn new(capacity: usize, arrivals: Vec<ArrivalSpec>) -> Self {
        Self {
            capacity,
            escalation_interval: default_escalation_interval(),
            tiers: TierTable::default(),
            arrivals,
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check scalar settings and every arrival entry
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.escalation_interval == 0 {
            return Err(ConfigError::ZeroEscalationInterval);
        }
        if self.escalation_interval > MAX_TICK {
            return Err(ConfigError::EscalationIntervalOutOfRange { max: MAX_TICK });
        }
        for tier in Tier::ALL {
            let settings = self.tiers.get(tier);
            if settings.tolerance == 0 {
                return Err(ConfigError::ZeroTolerance { tier });
            }
            if settings.tolerance > MAX_TICK || settings.service_duration > MAX_TICK {
                return Err(ConfigError::TierOutOfRange { tier, max: MAX_TICK });
            }
        }
        crate::arrivals::resolve_all(&self.arrivals, &self.tiers).map(|_| ())
    }
}
