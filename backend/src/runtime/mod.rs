//! Threaded runtime: the dispatcher driven by real time
//!
//! One background thread owns the decision cycle. It sleeps on a condvar
//! until the wall clock reaches the next event tick or until a caller
//! submits an arrival, then catches up with [`Dispatcher::run_through`].
//! Catching up in one batch yields the same events as the simulated run,
//! however late the thread wakes.
//!
//! # Critical Invariants
//!
//! 1. **Single authority**: every mutation happens under one mutex
//! 2. **No busy-wait**: the thread blocks until an event tick or a notification
//! 3. **Fail stop**: a consistency violation ends the thread and is returned
//!    from [`TriageRuntime::shutdown`]
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use triage_scheduler_core::dispatcher::Dispatcher;
//! use triage_scheduler_core::presets;
//! use triage_scheduler_core::runtime::TriageRuntime;
//!
//! let dispatcher = Dispatcher::new(presets::switchboard()).unwrap();
//! let runtime = TriageRuntime::spawn(dispatcher, Duration::from_millis(1)).unwrap();
//!
//! assert!(runtime.wait_until_idle(Duration::from_secs(10)));
//! let dispatcher = runtime.shutdown().unwrap();
//! assert_eq!(dispatcher.sink().arrivals, 4);
//! ```

use crate::arrivals::ArrivalSpec;
use crate::core::{Clock, Tick, WallClock};
use crate::dispatcher::{Dispatcher, SchedulerError};
use crate::models::PatientId;
use crate::stats::{Statistics, StatisticsSink};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

struct Shared<S: StatisticsSink> {
    dispatcher: Mutex<Dispatcher<S>>,
    /// Signalled on submit and shutdown
    wakeup: Condvar,
    /// Signalled after every catch-up and when the thread exits
    progress: Condvar,
    shutdown: AtomicBool,
    stopped: AtomicBool,
    clock: WallClock,
    /// Dispatcher tick at which the wall clock started
    base_tick: Tick,
}

impl<S: StatisticsSink> Shared<S> {
    fn wall_now(&self) -> Tick {
        self.base_tick + self.clock.now()
    }

    fn wait_time(&self, tick: Tick) -> Duration {
        self.clock.duration_until(tick.saturating_sub(self.base_tick))
    }
}

/// Handle to a dispatcher running on its own thread
///
/// Dropping the handle stops and joins the thread. A failure that stopped
/// the thread is then only logged; call [`TriageRuntime::shutdown`] to
/// receive it as an error.
pub struct TriageRuntime<S: StatisticsSink + Send + 'static = Statistics> {
    shared: Arc<Shared<S>>,
    handle: Option<JoinHandle<Result<(), SchedulerError>>>,
}

impl<S: StatisticsSink + Send + 'static> TriageRuntime<S> {
    /// Start driving `dispatcher`, one tick per `tick_duration` of real time
    ///
    /// The dispatcher's current tick is mapped onto the moment of the call.
    pub fn spawn(dispatcher: Dispatcher<S>, tick_duration: Duration) -> Result<Self, SchedulerError> {
        let shared = Arc::new(Shared {
            base_tick: dispatcher.now(),
            dispatcher: Mutex::new(dispatcher),
            wakeup: Condvar::new(),
            progress: Condvar::new(),
            shutdown: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            clock: WallClock::start(tick_duration),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("triage-dispatcher".to_string())
            .spawn(move || {
                let result = run_loop(&worker);
                worker.stopped.store(true, Ordering::Release);
                let _guard = worker.dispatcher.lock();
                worker.progress.notify_all();
                result
            })?;

        info!(tick_duration = ?shared.clock.tick_duration(), "dispatcher runtime started");
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Inject an arrival and wake the dispatcher
    pub fn submit(&self, spec: &ArrivalSpec) -> Result<PatientId, SchedulerError> {
        let mut dispatcher = self.shared.dispatcher.lock();
        let id = dispatcher.submit(spec)?;
        self.shared.wakeup.notify_one();
        Ok(id)
    }

    /// Run `f` with the dispatcher locked
    pub fn with_dispatcher<R>(&self, f: impl FnOnce(&Dispatcher<S>) -> R) -> R {
        f(&self.shared.dispatcher.lock())
    }

    /// Block until the dispatcher has nothing left to do
    ///
    /// Returns `false` on timeout, or if the thread stopped first.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut dispatcher = self.shared.dispatcher.lock();
        loop {
            if dispatcher.is_idle() {
                return true;
            }
            if self.shared.stopped.load(Ordering::Acquire) {
                return false;
            }
            if self
                .shared
                .progress
                .wait_until(&mut dispatcher, deadline)
                .timed_out()
            {
                return dispatcher.is_idle();
            }
        }
    }

    /// Whether the dispatcher thread has exited
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Stop the thread and hand back the dispatcher
    ///
    /// A consistency violation that stopped the thread early is returned here.
    pub fn shutdown(mut self) -> Result<Dispatcher<S>, SchedulerError> {
        let handle = self.handle.take();
        let shared = Arc::clone(&self.shared);
        drop(self);

        if let Some(handle) = handle {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => {
                    error!("dispatcher thread panicked");
                    return Err(SchedulerError::RuntimeTerminated);
                }
            }
        }
        info!("dispatcher runtime stopped");

        match Arc::try_unwrap(shared) {
            Ok(shared) => Ok(shared.dispatcher.into_inner()),
            Err(_) => Err(SchedulerError::RuntimeTerminated),
        }
    }

    fn signal_shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        // Notify under the lock so the flag cannot slip in before the wait.
        let _guard = self.shared.dispatcher.lock();
        self.shared.wakeup.notify_one();
    }
}

impl<S: StatisticsSink + Send + 'static> Drop for TriageRuntime<S> {
    fn drop(&mut self) {
        self.signal_shutdown();
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(%err, "dispatcher runtime dropped after failure"),
                Err(_) => error!("dispatcher thread panicked"),
            }
        }
    }
}

fn run_loop<S: StatisticsSink>(shared: &Shared<S>) -> Result<(), SchedulerError> {
    let mut dispatcher = shared.dispatcher.lock();
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            return Ok(());
        }

        let now = shared.wall_now();
        if let Err(err) = dispatcher.run_through(now) {
            error!(%err, tick = now, "dispatcher stopped");
            return Err(err);
        }
        shared.progress.notify_all();

        match dispatcher.next_event_tick() {
            Some(next) => {
                let wait = shared.wait_time(next);
                debug!(next, ?wait, "dispatcher sleeping");
                if !wait.is_zero() {
                    shared.wakeup.wait_for(&mut dispatcher, wait);
                }
            }
            None => shared.wakeup.wait(&mut dispatcher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::SchedulerConfig;
    use crate::models::Tier;

    #[test]
    fn test_idle_runtime_shuts_down_cleanly() {
        let dispatcher = Dispatcher::new(SchedulerConfig::new(1, Vec::new())).unwrap();
        let runtime = TriageRuntime::spawn(dispatcher, Duration::from_millis(2)).unwrap();
        assert!(runtime.wait_until_idle(Duration::from_millis(100)));
        assert!(!runtime.is_stopped());
        assert!(runtime.shutdown().is_ok());
    }

    #[test]
    fn test_submit_wakes_sleeping_dispatcher() {
        let dispatcher = Dispatcher::new(SchedulerConfig::new(1, Vec::new())).unwrap();
        let runtime = TriageRuntime::spawn(dispatcher, Duration::from_millis(2)).unwrap();

        let spec = ArrivalSpec::new(Tier::High, 0).with_service_duration(1).with_deadline(50);
        let id = runtime.submit(&spec).unwrap();
        assert!(runtime.wait_until_idle(Duration::from_secs(10)));

        let served = runtime.with_dispatcher(|d| d.sink().served);
        assert_eq!(served, 1);
        let dispatcher = runtime.shutdown().unwrap();
        assert_eq!(dispatcher.event_log().events_for_patient(id).len(), 3);
    }
}
