//! Domain models for the triage scheduler

pub mod event;
pub mod patient;
pub mod queue;
pub mod state;

// Re-exports
pub use event::{Event, EventLog, LostReason};
pub use patient::{Patient, PatientId, Tier};
pub use queue::TierQueue;
pub use state::{ConsistencyViolation, Location, TriageState};
