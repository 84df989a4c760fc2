//! Time management for the scheduler
//!
//! The scheduler operates in discrete ticks. Two clocks are provided:
//! a manual clock advanced by the dispatcher itself (deterministic
//! simulation) and a wall clock mapping elapsed real time onto ticks
//! (threaded runtime).

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Discrete scheduler time unit
pub type Tick = usize;

/// Largest tick value accepted from configuration
///
/// Deadlines are sums of up to three configured values; this bound keeps
/// them, and their conversion to signed urgency, far from overflow.
pub const MAX_TICK: Tick = Tick::MAX / 8;

/// Monotonic tick source
pub trait Clock {
    /// Current tick
    fn now(&self) -> Tick;
}

/// Clock advanced explicitly, one tick at a time or by jumps
///
/// # Example
/// ```
/// use triage_scheduler_core::core::{Clock, ManualClock};
///
/// let mut clock = ManualClock::new();
/// assert_eq!(clock.now(), 0);
///
/// clock.advance_tick();
/// assert_eq!(clock.now(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualClock {
    /// Total ticks elapsed since the scheduler started
    current_tick: Tick,
}

impl ManualClock {
    /// Create a clock positioned at tick 0
    pub fn new() -> Self {
        Self { current_tick: 0 }
    }

    /// Create a clock positioned at an arbitrary tick (checkpoint restore)
    pub fn starting_at(tick: Tick) -> Self {
        Self { current_tick: tick }
    }

    /// Advance time by one tick
    pub fn advance_tick(&mut self) {
        self.current_tick += 1;
    }

    /// Jump forward to `tick`
    ///
    /// # Panics
    /// Panics if `tick` lies in the past: the clock is monotonic.
    pub fn advance_to(&mut self, tick: Tick) {
        assert!(
            tick >= self.current_tick,
            "clock is monotonic: cannot move from {} back to {}",
            self.current_tick,
            tick
        );
        self.current_tick = tick;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        self.current_tick
    }
}

/// Clock derived from real elapsed time
///
/// Tick `n` starts at `origin + n * tick_duration`.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
    tick_duration: Duration,
}

impl WallClock {
    /// Start a wall clock at tick 0, now
    pub fn start(tick_duration: Duration) -> Self {
        assert!(!tick_duration.is_zero(), "tick_duration must be positive");
        Self {
            origin: Instant::now(),
            tick_duration,
        }
    }

    /// Length of one tick
    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Real time remaining until `tick` begins (zero if already reached)
    pub fn duration_until(&self, tick: Tick) -> Duration {
        let ticks = u32::try_from(tick).unwrap_or(u32::MAX);
        let target = self.origin + self.tick_duration.saturating_mul(ticks);
        target.saturating_duration_since(Instant::now())
    }
}

impl Clock for WallClock {
    fn now(&self) -> Tick {
        let elapsed = self.origin.elapsed().as_nanos();
        (elapsed / self.tick_duration.as_nanos()) as Tick
    }
}
