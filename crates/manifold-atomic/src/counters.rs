//! Per-profile cycle counters.
//!
//! This module provides [`CycleCounter`], a monotonic counter with a target,
//! and [`CycleCounters`], the fixed set of counters for the three profiles
//! of a durability run.
//!
//! # Ordering
//!
//! Increments use `AcqRel` and loads use `Acquire`: a reader that observes a
//! count also observes every side effect the owning loop performed before
//! incrementing (for example the setpoint command of a thermal cycle).

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// The physical quantity a profile cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Manifold pressure, driven by the pump duty cycle.
    Pressure,
    /// Fluid loop temperature.
    Fluid,
    /// Environmental chamber temperature.
    Chamber,
}

impl ProfileKind {
    /// All profiles, in display order.
    pub const ALL: [ProfileKind; 3] = [Self::Pressure, Self::Fluid, Self::Chamber];

    /// Get the profile name as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pressure => "pressure",
            Self::Fluid => "fluid",
            Self::Chamber => "chamber",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Profile the counter belongs to.
    pub kind: ProfileKind,
    /// Completed cycles.
    pub current: u64,
    /// Cycles required for the profile to be complete.
    pub target: u64,
}

impl CounterSnapshot {
    /// Returns true once `current >= target`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current >= self.target
    }

    /// Cycles left before the target is reached.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.target.saturating_sub(self.current)
    }
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}/{}", self.kind, self.current, self.target)
    }
}

/// Monotonic cycle counter with a target count.
///
/// The counter only moves backwards through [`CycleCounter::force_set`] and
/// [`CycleCounter::reset`], which are reserved for profile generation and
/// operator-initiated manual resume.
#[derive(Debug)]
pub struct CycleCounter {
    kind: ProfileKind,
    current: AtomicU64,
    target: AtomicU64,
}

impl CycleCounter {
    /// Create a counter at zero with a zero target.
    #[must_use]
    pub const fn new(kind: ProfileKind) -> Self {
        Self {
            kind,
            current: AtomicU64::new(0),
            target: AtomicU64::new(0),
        }
    }

    /// Create a counter with initial values.
    #[must_use]
    pub const fn with_values(kind: ProfileKind, current: u64, target: u64) -> Self {
        Self {
            kind,
            current: AtomicU64::new(current),
            target: AtomicU64::new(target),
        }
    }

    /// Profile this counter belongs to.
    #[must_use]
    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    /// Record one completed cycle and return the new count.
    #[inline]
    pub fn increment(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Current count.
    #[inline]
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Target count.
    #[inline]
    #[must_use]
    pub fn target(&self) -> u64 {
        self.target.load(Ordering::Acquire)
    }

    /// Set the target count.
    pub fn set_target(&self, target: u64) {
        self.target.store(target, Ordering::Release);
    }

    /// Overwrite the current count (manual resume).
    pub fn force_set(&self, current: u64) {
        self.current.store(current, Ordering::Release);
    }

    /// Reset the current count to zero, keeping the target.
    pub fn reset(&self) {
        self.current.store(0, Ordering::Release);
    }

    /// Returns true once the target has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current() >= self.target()
    }

    /// Read the counter.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            kind: self.kind,
            current: self.current(),
            target: self.target(),
        }
    }
}

/// Snapshot of all three counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclesSnapshot {
    /// Pressure counter.
    pub pressure: CounterSnapshot,
    /// Fluid counter.
    pub fluid: CounterSnapshot,
    /// Chamber counter.
    pub chamber: CounterSnapshot,
}

impl CyclesSnapshot {
    /// Look up a counter by profile.
    #[must_use]
    pub fn get(&self, kind: ProfileKind) -> CounterSnapshot {
        match kind {
            ProfileKind::Pressure => self.pressure,
            ProfileKind::Fluid => self.fluid,
            ProfileKind::Chamber => self.chamber,
        }
    }
}

impl fmt::Display for CyclesSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.pressure, self.fluid, self.chamber)
    }
}

/// The fixed counter set of a durability run.
///
/// Individual counters are exposed so they can be shared with the loop that
/// owns them; the set itself is usually held in an `Arc`.
#[derive(Debug)]
pub struct CycleCounters {
    pressure: CycleCounter,
    fluid: CycleCounter,
    chamber: CycleCounter,
}

impl Default for CycleCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleCounters {
    /// Create all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pressure: CycleCounter::new(ProfileKind::Pressure),
            fluid: CycleCounter::new(ProfileKind::Fluid),
            chamber: CycleCounter::new(ProfileKind::Chamber),
        }
    }

    /// Counter for a profile.
    #[must_use]
    pub fn get(&self, kind: ProfileKind) -> &CycleCounter {
        match kind {
            ProfileKind::Pressure => &self.pressure,
            ProfileKind::Fluid => &self.fluid,
            ProfileKind::Chamber => &self.chamber,
        }
    }

    /// Reset every counter to zero, keeping targets.
    pub fn reset_all(&self) {
        for kind in ProfileKind::ALL {
            self.get(kind).reset();
        }
    }

    /// Read all counters.
    ///
    /// Each counter is read atomically; the three reads are not one atomic
    /// operation, which is fine because each counter has its own writer.
    #[must_use]
    pub fn snapshot(&self) -> CyclesSnapshot {
        CyclesSnapshot {
            pressure: self.pressure.snapshot(),
            fluid: self.fluid.snapshot(),
            chamber: self.chamber.snapshot(),
        }
    }
}
