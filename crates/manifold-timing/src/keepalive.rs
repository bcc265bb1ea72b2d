//! Keep-alive command resend.
//!
//! Some pump controllers fall back to a safe state when they stop hearing
//! from the host for a few hundred milliseconds. A [`KeepAliveDriver`] owns
//! one such actuator and re-sends the last commanded value at a fixed
//! cadence until it is stopped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use manifold_errors::RigResult;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::task::{TaskHandle, spawn_task};

/// Commanded pump output in percent, clamped to `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct PowerPercent(f32);

impl PowerPercent {
    /// Zero output.
    pub const ZERO: Self = Self(0.0);

    /// Full output.
    pub const MAX: Self = Self(100.0);

    /// Create a value, clamping to `0..=100`. NaN maps to zero.
    #[must_use]
    pub fn new(percent: f32) -> Self {
        if percent.is_nan() {
            Self::ZERO
        } else {
            Self(percent.clamp(0.0, 100.0))
        }
    }

    /// Value in percent.
    #[must_use]
    pub fn get(self) -> f32 {
        self.0
    }

    /// Returns true for zero output.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 <= 0.0
    }
}

impl fmt::Display for PowerPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl From<f32> for PowerPercent {
    fn from(percent: f32) -> Self {
        Self::new(percent)
    }
}

/// An actuator that needs periodic re-commanding.
pub trait KeepAliveActuator: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Enable the output stage.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Device`](manifold_errors::RigError::Device) if the actuator rejects the command.
    fn start(&self) -> RigResult<()>;

    /// Command an output level.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Device`](manifold_errors::RigError::Device) if the actuator rejects the command.
    fn set_power(&self, power: PowerPercent) -> RigResult<()>;

    /// Disable the output stage.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Device`](manifold_errors::RigError::Device) if the actuator rejects the command.
    fn stop(&self) -> RigResult<()>;
}

/// Shared slot holding the value the driver re-sends.
///
/// Cloning yields another handle to the same slot, so the component that
/// decides the value does not need access to the driver itself.
#[derive(Debug, Clone, Default)]
pub struct CommandSlot {
    bits: Arc<AtomicU32>,
}

impl CommandSlot {
    /// Create a slot holding zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value.
    pub fn set(&self, power: PowerPercent) {
        self.bits.store(power.get().to_bits(), Ordering::Release);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> PowerPercent {
        PowerPercent::new(f32::from_bits(self.bits.load(Ordering::Acquire)))
    }
}

#[derive(Debug, Default)]
struct DriverStats {
    sends: AtomicU64,
    failures: AtomicU64,
}

struct Worker {
    token: CancelToken,
    handle: TaskHandle<()>,
}

/// Re-sends the value in a [`CommandSlot`] to an actuator at a fixed cadence.
///
/// While running, the actuator receives at least one command per cadence.
/// Stopping sends a final zero and disables the actuator; once
/// [`KeepAliveDriver::stop`] returns, no further commands are sent.
pub struct KeepAliveDriver<A: KeepAliveActuator + ?Sized> {
    actuator: Arc<A>,
    cadence: Duration,
    stop_slack: Duration,
    slot: CommandSlot,
    stats: Arc<DriverStats>,
    running: Arc<AtomicBool>,
    worker: Option<Worker>,
}

impl<A: KeepAliveActuator + ?Sized> fmt::Debug for KeepAliveDriver<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAliveDriver")
            .field("actuator", &self.actuator.name())
            .field("cadence", &self.cadence)
            .field("value", &self.slot.get())
            .field("running", &self.running.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<A: KeepAliveActuator + ?Sized + 'static> KeepAliveDriver<A> {
    /// Create a stopped driver.
    #[must_use]
    pub fn new(actuator: Arc<A>, cadence: Duration) -> Self {
        Self {
            actuator,
            cadence,
            stop_slack: Duration::from_millis(500),
            slot: CommandSlot::new(),
            stats: Arc::new(DriverStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Set the extra time allowed beyond one cadence when joining the worker.
    #[must_use]
    pub fn with_stop_slack(mut self, slack: Duration) -> Self {
        self.stop_slack = slack;
        self
    }

    /// The driven actuator.
    #[must_use]
    pub fn actuator(&self) -> &Arc<A> {
        &self.actuator
    }

    /// Re-send cadence.
    #[must_use]
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Handle to the value slot.
    #[must_use]
    pub fn slot(&self) -> CommandSlot {
        self.slot.clone()
    }

    /// Set the value to send. Takes effect on the next send.
    pub fn set_value(&self, power: PowerPercent) {
        self.slot.set(power);
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> PowerPercent {
        self.slot.get()
    }

    /// Returns true while the resend loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Commands delivered successfully.
    #[must_use]
    pub fn send_count(&self) -> u64 {
        self.stats.sends.load(Ordering::Relaxed)
    }

    /// Commands the actuator rejected.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.stats.failures.load(Ordering::Relaxed)
    }

    /// Enable the actuator and start re-sending.
    ///
    /// Starting a running driver is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the actuator's error if it cannot be enabled, or
    /// [`RigError::TaskSpawn`](manifold_errors::RigError::TaskSpawn) if the worker cannot be created.
    pub fn start(&mut self) -> RigResult<()> {
        if self.worker.is_some() {
            debug!(actuator = self.actuator.name(), "Keep-alive already running");
            return Ok(());
        }

        self.actuator.start()?;

        let token = CancelToken::new();
        let loop_token = token.clone();
        let actuator = Arc::clone(&self.actuator);
        let slot = self.slot.clone();
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let cadence = self.cadence;

        running.store(true, Ordering::Release);
        let handle = spawn_task(format!("keepalive-{}", self.actuator.name()), move || {
            resend_loop(actuator.as_ref(), &slot, &stats, cadence, &loop_token);
            running.store(false, Ordering::Release);
        });

        match handle {
            Ok(handle) => {
                info!(
                    actuator = self.actuator.name(),
                    cadence_ms = cadence.as_millis(),
                    "Keep-alive started"
                );
                self.worker = Some(Worker { token, handle });
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Stop re-sending, command zero and disable the actuator.
    ///
    /// Stopping a stopped driver is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::ShutdownTimeout`](manifold_errors::RigError::ShutdownTimeout) if the loop does not exit within
    /// one cadence plus the stop slack. The zero command and actuator stop
    /// are still attempted; their own failures are returned only when the
    /// join succeeded.
    pub fn stop(&mut self) -> RigResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker.token.cancel();
        let joined = worker.handle.join_within(self.cadence + self.stop_slack);
        self.running.store(false, Ordering::Release);

        let zero = self.actuator.set_power(PowerPercent::ZERO);
        let stopped = self.actuator.stop();
        info!(actuator = self.actuator.name(), "Keep-alive stopped");

        joined.and(zero).and(stopped)
    }
}

fn resend_loop<A: KeepAliveActuator + ?Sized>(
    actuator: &A,
    slot: &CommandSlot,
    stats: &DriverStats,
    cadence: Duration,
    token: &CancelToken,
) {
    let mut next = Instant::now();
    loop {
        let value = slot.get();
        match actuator.set_power(value) {
            Ok(()) => {
                stats.sends.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!(actuator = actuator.name(), %value, error = %e, "Keep-alive send failed");
            }
        }

        next += cadence;
        let now = Instant::now();
        if now > next + cadence {
            // Fell more than a cadence behind; resynchronise instead of bursting.
            next = now;
        }
        if token.wait_timeout(next.saturating_duration_since(now)) {
            break;
        }
    }
}

impl<A: KeepAliveActuator + ?Sized> Drop for KeepAliveDriver<A> {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.token.cancel();
        if let Err(e) = worker.handle.join_within(self.cadence + self.stop_slack) {
            warn!(actuator = self.actuator.name(), error = %e, "Keep-alive dropped while running");
        }
        if let Err(e) = self.actuator.set_power(PowerPercent::ZERO) {
            warn!(actuator = self.actuator.name(), error = %e, "Failed to zero actuator on drop");
        }
        if let Err(e) = self.actuator.stop() {
            warn!(actuator = self.actuator.name(), error = %e, "Failed to stop actuator on drop");
        }
    }
}
