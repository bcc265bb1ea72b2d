//! Repeating countdown timer with pause/resume.
//!
//! # Semantics
//!
//! - `start` from [`TimerState::Stopped`] invokes the callback once on the
//!   caller's thread, then arms a full-interval countdown.
//! - `start` from [`TimerState::Paused`] arms a countdown for the remaining
//!   time without firing.
//! - When a countdown expires the callback runs on the timer's worker
//!   thread and the next countdown is armed from the expired deadline, so
//!   callback latency does not accumulate as drift.
//! - `pause` stores `remaining - elapsed`, clamped to `[0, interval]`.
//! - `pause` and `stop` wait for a callback that is already running on
//!   another thread, and a countdown cancelled by them never fires.
//!
//! Pausing and resuming therefore conserves time: the sum of running
//! intervals between two fires is one interval.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use manifold_errors::{RigError, RigResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::task::{TaskHandle, spawn_task};

/// Upper bound for joining the worker after it has been signalled.
const WORKER_JOIN_BOUND: Duration = Duration::from_secs(2);

/// Callback invoked on every fire.
pub type TimerCallback = Box<dyn Fn() + Send + Sync>;

/// Lifecycle state of a [`ResumableTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerState {
    /// Not armed; the next start fires immediately.
    Stopped,
    /// Counting down.
    Running,
    /// Frozen with a remaining time.
    Paused,
}

impl TimerState {
    /// State name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Core {
    state: TimerState,
    /// Countdown length measured from `armed_at`.
    remaining: Duration,
    armed_at: Option<Instant>,
    /// Bumped by every start, pause and stop. A worker only acts while the
    /// generation it was spawned with is current.
    generation: u64,
    firing_on: Option<ThreadId>,
    fires: u64,
}

struct Shared {
    name: String,
    interval: Duration,
    clock: Arc<dyn Clock>,
    core: Mutex<Core>,
    cond: Condvar,
    on_fire: TimerCallback,
}

impl Shared {
    fn wait_not_firing(&self, core: &mut MutexGuard<'_, Core>) {
        let me = thread::current().id();
        while matches!(core.firing_on, Some(id) if id != me) {
            self.cond.wait(core);
        }
    }

    fn fire(&self, mut core: MutexGuard<'_, Core>) -> MutexGuard<'_, Core> {
        core.firing_on = Some(thread::current().id());
        core.fires += 1;
        let fires = core.fires;
        drop(core);

        trace!(timer = %self.name, fires, "Timer fired");
        (self.on_fire)();

        let mut core = self.core.lock();
        core.firing_on = None;
        self.cond.notify_all();
        core
    }

    fn run(&self, generation: u64) {
        let mut core = self.core.lock();
        loop {
            if core.generation != generation || core.state != TimerState::Running {
                return;
            }
            let Some(armed_at) = core.armed_at else {
                return;
            };
            let deadline = armed_at + core.remaining;
            let now = self.clock.now();
            if now < deadline {
                let timed_out = self.cond.wait_for(&mut core, deadline - now).timed_out();
                trace!(timer = %self.name, timed_out, "Timer woke");
                continue;
            }

            core.armed_at = Some(deadline);
            core.remaining = self.interval;
            core = self.fire(core);
        }
    }
}

/// A repeating timer whose countdown survives pause and resume.
///
/// All methods take `&self`; the timer is usually shared behind an `Arc`
/// with the component that controls it.
///
/// # Example
///
/// ```rust
/// use manifold_timing::{ResumableTimer, TimerState};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # fn main() -> manifold_errors::RigResult<()> {
/// let fires = Arc::new(AtomicU32::new(0));
/// let counter = Arc::clone(&fires);
/// let timer = ResumableTimer::new("fluid", Duration::from_secs(3600), move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// timer.start()?;
/// assert_eq!(fires.load(Ordering::SeqCst), 1);
///
/// let remaining = timer.pause()?;
/// assert!(remaining <= Duration::from_secs(3600));
/// assert_eq!(timer.state(), TimerState::Paused);
/// # Ok(())
/// # }
/// ```
pub struct ResumableTimer {
    shared: Arc<Shared>,
    worker: Mutex<Option<TaskHandle<()>>>,
}

impl fmt::Debug for ResumableTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.lock();
        f.debug_struct("ResumableTimer")
            .field("name", &self.shared.name)
            .field("interval", &self.shared.interval)
            .field("state", &core.state)
            .field("remaining", &core.remaining)
            .finish_non_exhaustive()
    }
}

impl ResumableTimer {
    /// Create a stopped timer on the monotonic clock.
    pub fn new<F>(name: impl Into<String>, interval: Duration, on_fire: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_clock(name, interval, Arc::new(MonotonicClock), on_fire)
    }

    /// Create a stopped timer reading time from `clock`.
    pub fn with_clock<F>(
        name: impl Into<String>,
        interval: Duration,
        clock: Arc<dyn Clock>,
        on_fire: F,
    ) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                interval,
                clock,
                core: Mutex::new(Core {
                    state: TimerState::Stopped,
                    remaining: interval,
                    armed_at: None,
                    generation: 0,
                    firing_on: None,
                    fires: 0,
                }),
                cond: Condvar::new(),
                on_fire: Box::new(on_fire),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Timer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TimerState {
        self.shared.core.lock().state
    }

    /// Number of times the callback has been invoked.
    #[must_use]
    pub fn fire_count(&self) -> u64 {
        self.shared.core.lock().fires
    }

    /// Time left before the next fire.
    ///
    /// Counts down live while running.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let core = self.shared.core.lock();
        match (core.state, core.armed_at) {
            (TimerState::Running, Some(armed_at)) => {
                let elapsed = self.shared.clock.now().saturating_duration_since(armed_at);
                core.remaining
                    .saturating_sub(elapsed)
                    .min(self.shared.interval)
            }
            _ => core.remaining,
        }
    }

    /// Start or resume the countdown.
    ///
    /// Starting a running timer is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::TaskSpawn`] if the worker thread cannot be
    /// created. The timer is left paused with its remaining time intact.
    pub fn start(&self) -> RigResult<()> {
        let shared = &self.shared;
        let mut core = shared.core.lock();
        shared.wait_not_firing(&mut core);

        let fresh = match core.state {
            TimerState::Running => {
                debug!(timer = %shared.name, "Timer already running");
                return Ok(());
            }
            TimerState::Paused => false,
            TimerState::Stopped => {
                core.remaining = shared.interval;
                true
            }
        };

        core.state = TimerState::Running;
        core.generation += 1;
        let generation = core.generation;

        if fresh {
            core = shared.fire(core);
            if core.generation != generation {
                // Paused or stopped from inside the callback.
                return Ok(());
            }
        }

        core.armed_at = Some(shared.clock.now());
        debug!(
            timer = %shared.name,
            remaining_ms = core.remaining.as_millis(),
            fresh,
            "Timer armed"
        );
        drop(core);

        self.join_worker()?;
        let worker_shared = Arc::clone(shared);
        match spawn_task(format!("timer-{}", shared.name), move || {
            worker_shared.run(generation);
        }) {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                let mut core = shared.core.lock();
                if core.generation == generation {
                    Self::freeze(shared, &mut core, TimerState::Paused);
                }
                Err(e)
            }
        }
    }

    /// Pause the countdown and return the remaining time.
    ///
    /// Pausing a timer that is not running is a no-op returning the stored
    /// remaining time.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::ShutdownTimeout`] if the worker does not exit.
    pub fn pause(&self) -> RigResult<Duration> {
        let remaining = {
            let mut core = self.shared.core.lock();
            self.shared.wait_not_firing(&mut core);
            if core.state != TimerState::Running {
                return Ok(core.remaining);
            }
            Self::freeze(&self.shared, &mut core, TimerState::Paused);
            core.remaining
        };
        debug!(
            timer = %self.shared.name,
            remaining_ms = remaining.as_millis(),
            "Timer paused"
        );
        self.join_worker()?;
        Ok(remaining)
    }

    /// Stop the timer and discard the remaining time.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::ShutdownTimeout`] if the worker does not exit.
    pub fn stop(&self) -> RigResult<()> {
        {
            let mut core = self.shared.core.lock();
            self.shared.wait_not_firing(&mut core);
            if core.state == TimerState::Stopped {
                return Ok(());
            }
            Self::freeze(&self.shared, &mut core, TimerState::Stopped);
            core.remaining = self.shared.interval;
        }
        debug!(timer = %self.shared.name, "Timer stopped");
        self.join_worker()
    }

    /// Put a non-running timer into the paused state with `remaining` left.
    ///
    /// Used to restore a countdown from a checkpoint. The value is clamped
    /// to the interval.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::InvalidTransition`] if the timer is running.
    pub fn restore(&self, remaining: Duration) -> RigResult<()> {
        let mut core = self.shared.core.lock();
        if core.state == TimerState::Running {
            return Err(RigError::invalid_transition("running", "restore a timer"));
        }
        core.state = TimerState::Paused;
        core.remaining = remaining.min(self.shared.interval);
        core.armed_at = None;
        core.generation += 1;
        debug!(
            timer = %self.shared.name,
            remaining_ms = core.remaining.as_millis(),
            "Timer restored"
        );
        Ok(())
    }

    fn freeze(shared: &Shared, core: &mut Core, state: TimerState) {
        if let Some(armed_at) = core.armed_at.take() {
            let elapsed = shared.clock.now().saturating_duration_since(armed_at);
            core.remaining = core.remaining.saturating_sub(elapsed).min(shared.interval);
        }
        core.state = state;
        core.generation += 1;
        shared.cond.notify_all();
    }

    fn join_worker(&self) -> RigResult<()> {
        let handle = self.worker.lock().take();
        match handle {
            Some(handle) if handle.is_current() => Ok(()),
            Some(handle) => handle.join_within(WORKER_JOIN_BOUND),
            None => Ok(()),
        }
    }
}

impl Drop for ResumableTimer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(timer = %self.shared.name, error = %e, "Timer did not stop cleanly");
        }
    }
}
