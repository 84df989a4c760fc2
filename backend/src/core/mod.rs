//! Core time primitives: tick clocks and the deferred-callback queue

pub mod time;
pub mod timer;

pub use time::{Clock, ManualClock, Tick, WallClock, MAX_TICK};
pub use timer::TimerQueue;
