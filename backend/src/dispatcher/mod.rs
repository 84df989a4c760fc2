//! Dispatcher: configuration, the decision cycle, and checkpoints

pub mod checkpoint;
pub mod config;
pub mod engine;

pub use checkpoint::{compute_config_hash, AdmittedSnapshot, PatientSnapshot, StateSnapshot};
pub use config::{ConfigError, SchedulerConfig, TierConfig, TierTable};
pub use engine::{Dispatcher, SchedulerError, TickResult};
