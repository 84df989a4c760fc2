//! Triage Scheduler Core - Rust Engine
//!
//! Deadline-aware admission of patients into a fixed pool of treatment
//! rooms, with deterministic execution.
//!
//! # Architecture
//!
//! - **core**: Tick clocks and the deferred-completion timer queue
//! - **models**: Domain types (Patient, Tier, TriageState, Event)
//! - **arrivals**: Arrival schedule and late submissions
//! - **escalation**: Promotion and loss of overdue patients
//! - **pool**: Treatment rooms and their completions
//! - **dispatcher**: Configuration, decision cycle, checkpoints
//! - **stats**: Statistics sink fed by every event
//! - **runtime**: Dispatcher driven by a real-time background thread
//! - **presets**: Ready-made ward configurations
//!
//! # Critical Invariants
//!
//! 1. Occupied rooms never exceed capacity
//! 2. A patient is queued in one tier or occupies one room, never both
//! 3. Tiers only move toward more urgent
//! 4. Same configuration = same event stream

// Module declarations
pub mod arrivals;
pub mod core;
pub mod dispatcher;
pub mod escalation;
pub mod models;
pub mod pool;
pub mod presets;
pub mod runtime;
pub mod stats;

// Re-exports for convenience
pub use arrivals::{ArrivalFeed, ArrivalSpec};
pub use core::{Clock, ManualClock, Tick, WallClock};
pub use dispatcher::{
    compute_config_hash, ConfigError, Dispatcher, SchedulerConfig, SchedulerError, StateSnapshot,
    TickResult, TierConfig, TierTable,
};
pub use models::{
    ConsistencyViolation, Event, EventLog, LostReason, Patient, PatientId, Tier, TriageState,
};
pub use pool::{CompletionEvent, ResourcePool};
pub use runtime::TriageRuntime;
pub use stats::{NullSink, Statistics, StatisticsSink};
