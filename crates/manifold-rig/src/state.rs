//! Orchestrator lifecycle state.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Lifecycle state of a rig run.
///
/// ```text
/// Idle ──generate──▶ ProfileGenerated ──start──▶ Running ◀──start── Paused
///                          ▲                   │  │  └──pause──────▶ │
///                          │ manual_reset      │  └──target reached─▶ Completed
///                       Faulted ◀──fault───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RigState {
    /// No profile loaded.
    Idle,
    /// Profile loaded, counters and timers initialised.
    ProfileGenerated,
    /// Loops active.
    Running,
    /// Loops stopped, progress retained.
    Paused,
    /// Leak detected; needs an operator reset.
    Faulted,
    /// Pressure target reached.
    Completed,
}

impl RigState {
    /// State name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ProfileGenerated => "profile_generated",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Faulted => "faulted",
            Self::Completed => "completed",
        }
    }

    /// Returns true if a profile may be generated from this state.
    #[must_use]
    pub fn can_generate(self) -> bool {
        matches!(self, Self::Idle | Self::ProfileGenerated | Self::Completed)
    }

    /// Returns true if a run may be started from this state.
    #[must_use]
    pub fn can_start(self) -> bool {
        matches!(self, Self::ProfileGenerated | Self::Paused)
    }

    /// Returns true while loops may be active or resumable.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for RigState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus a condition variable for waiters.
#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<RigState>,
    cond: Condvar,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RigState::Idle),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn get(&self) -> RigState {
        *self.state.lock()
    }

    /// Set the state and return the previous one.
    pub(crate) fn set(&self, next: RigState) -> RigState {
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut *state, next);
        if previous != next {
            info!(from = %previous, to = %next, "Rig state changed");
        }
        self.cond.notify_all();
        previous
    }

    /// Wait until the state equals `target`. Returns whether it did.
    pub(crate) fn wait_for(&self, target: RigState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state != target {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return *state == target;
            }
        }
        true
    }
}
