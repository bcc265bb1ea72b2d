//! In-process devices for dry runs and tests.
//!
//! Every simulated device records the commands it receives with a
//! timestamp, can be told to refuse connections, and (for the DAQ) serves
//! injectable sensor values including a scheduled leak.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use manifold_errors::{RigError, RigResult};
use manifold_timing::{KeepAliveActuator, PowerPercent};
use parking_lot::Mutex;
use tracing::trace;

use crate::ports::{PumpActuator, SensorSource, ThermalActuator};

/// Connection behaviour shared by every simulated device.
#[derive(Debug, Default)]
struct Link {
    connected: AtomicBool,
    refuse: AtomicBool,
}

impl Link {
    fn connect(&self) -> bool {
        let ok = !self.refuse.load(Ordering::SeqCst);
        self.connected.store(ok, Ordering::SeqCst);
        ok
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
        if refuse {
            self.connected.store(false, Ordering::SeqCst);
        }
    }
}

/// A timestamped command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recorded<T> {
    /// When the command arrived.
    pub at: Instant,
    /// Command value.
    pub value: T,
}

/// A simulated pump channel.
#[derive(Debug)]
pub struct SimulatedPump {
    name: String,
    link: Link,
    enabled: AtomicBool,
    commands: Mutex<Vec<Recorded<f32>>>,
    starts: AtomicU64,
    stops: AtomicU64,
}

impl SimulatedPump {
    /// Create a disconnected pump.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: Link::default(),
            enabled: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
            starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        }
    }

    /// Make future `connect` calls fail (and drop the current connection).
    pub fn refuse_connections(&self, refuse: bool) {
        self.link.refuse(refuse);
    }

    /// Every power command received.
    #[must_use]
    pub fn commands(&self) -> Vec<Recorded<f32>> {
        self.commands.lock().clone()
    }

    /// Most recent power command.
    #[must_use]
    pub fn last_power(&self) -> Option<f32> {
        self.commands.lock().last().map(|c| c.value)
    }

    /// Returns true between `start` and `stop`.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Number of `start` calls.
    #[must_use]
    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls.
    #[must_use]
    pub fn stop_count(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }
}

impl KeepAliveActuator for SimulatedPump {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> RigResult<()> {
        if !self.link.is_connected() {
            return Err(RigError::device(&self.name, "not connected"));
        }
        self.enabled.store(true, Ordering::SeqCst);
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_power(&self, power: PowerPercent) -> RigResult<()> {
        if !self.link.is_connected() {
            return Err(RigError::device(&self.name, "not connected"));
        }
        trace!(pump = %self.name, %power, "Power command");
        self.commands.lock().push(Recorded {
            at: Instant::now(),
            value: power.get(),
        });
        Ok(())
    }

    fn stop(&self) -> RigResult<()> {
        self.enabled.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PumpActuator for SimulatedPump {
    fn connect(&self) -> bool {
        self.link.connect()
    }

    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }
}

/// A simulated temperature bath.
#[derive(Debug)]
pub struct SimulatedBath {
    name: String,
    link: Link,
    powered: AtomicBool,
    reject_setpoints: AtomicBool,
    setpoints: Mutex<Vec<Recorded<f64>>>,
}

impl SimulatedBath {
    /// Create a disconnected, powered-off bath.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: Link::default(),
            powered: AtomicBool::new(false),
            reject_setpoints: AtomicBool::new(false),
            setpoints: Mutex::new(Vec::new()),
        }
    }

    /// Make future `connect` calls fail (and drop the current connection).
    pub fn refuse_connections(&self, refuse: bool) {
        self.link.refuse(refuse);
    }

    /// Make `set_setpoint` fail.
    pub fn reject_setpoints(&self, reject: bool) {
        self.reject_setpoints.store(reject, Ordering::SeqCst);
    }

    /// Every setpoint received.
    #[must_use]
    pub fn setpoints(&self) -> Vec<Recorded<f64>> {
        self.setpoints.lock().clone()
    }

    /// Most recent setpoint.
    #[must_use]
    pub fn last_setpoint(&self) -> Option<f64> {
        self.setpoints.lock().last().map(|s| s.value)
    }

    /// Returns true while powered on.
    #[must_use]
    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }
}

impl ThermalActuator for SimulatedBath {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> bool {
        self.link.connect()
    }

    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    fn power_on(&self) -> RigResult<()> {
        self.powered.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn power_off(&self) -> RigResult<()> {
        self.powered.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_setpoint(&self, celsius: f64) -> RigResult<()> {
        if self.reject_setpoints.load(Ordering::SeqCst) {
            return Err(RigError::device(&self.name, "setpoint rejected"));
        }
        trace!(bath = %self.name, celsius, "Setpoint command");
        self.setpoints.lock().push(Recorded {
            at: Instant::now(),
            value: celsius,
        });
        Ok(())
    }
}

/// What a simulated channel returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelValue {
    /// A fixed reading.
    Constant(f64),
    /// No reading available.
    Unavailable,
    /// `before` until `at`, then `after`.
    Leak {
        /// Reading before the leak.
        before: f64,
        /// Reading once leaking.
        after: f64,
        /// Onset of the leak.
        at: Instant,
    },
}

impl ChannelValue {
    fn sample(self, now: Instant) -> Option<f64> {
        match self {
            Self::Constant(value) => Some(value),
            Self::Unavailable => None,
            Self::Leak { before, after, at } => Some(if now < at { before } else { after }),
        }
    }
}

/// A simulated data acquisition system.
#[derive(Debug)]
pub struct SimulatedDaq {
    name: String,
    link: Link,
    channels: Mutex<BTreeMap<String, ChannelValue>>,
    reads: Mutex<BTreeMap<String, u64>>,
}

impl SimulatedDaq {
    /// Create a disconnected DAQ with no channels.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: Link::default(),
            channels: Mutex::new(BTreeMap::new()),
            reads: Mutex::new(BTreeMap::new()),
        }
    }

    /// Add a channel or replace its value.
    pub fn set_value(&self, sensor: impl Into<String>, value: f64) {
        self.channels
            .lock()
            .insert(sensor.into(), ChannelValue::Constant(value));
    }

    /// Make a channel unavailable.
    pub fn set_unavailable(&self, sensor: impl Into<String>) {
        self.channels
            .lock()
            .insert(sensor.into(), ChannelValue::Unavailable);
    }

    /// Drop a channel to `leaking` after `delay`, holding `healthy` before.
    pub fn schedule_leak(
        &self,
        sensor: impl Into<String>,
        healthy: f64,
        leaking: f64,
        delay: Duration,
    ) {
        self.channels.lock().insert(
            sensor.into(),
            ChannelValue::Leak {
                before: healthy,
                after: leaking,
                at: Instant::now() + delay,
            },
        );
    }

    /// Make future `connect` calls fail (and drop the current connection).
    pub fn refuse_connections(&self, refuse: bool) {
        self.link.refuse(refuse);
    }

    /// Number of reads of a channel, including unavailable ones.
    #[must_use]
    pub fn read_count(&self, sensor: &str) -> u64 {
        self.reads.lock().get(sensor).copied().unwrap_or(0)
    }
}

impl SensorSource for SimulatedDaq {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> bool {
        self.link.connect()
    }

    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    fn list_names(&self) -> Vec<String> {
        self.channels.lock().keys().cloned().collect()
    }

    fn read(&self, name: &str) -> RigResult<f64> {
        *self.reads.lock().entry(name.to_string()).or_insert(0) += 1;
        let channel = self.channels.lock().get(name).copied();
        match channel {
            None => Err(RigError::transient_sample(name, "unknown channel")),
            Some(value) => value
                .sample(Instant::now())
                .ok_or_else(|| RigError::transient_sample(name, "unavailable")),
        }
    }
}
