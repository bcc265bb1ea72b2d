//! The debounced fault monitor.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::thresholds::FaultThresholds;

/// A sustained out-of-band reading that tripped the monitor.
///
/// This is data, not an error: it is the rig correctly detecting a hardware
/// problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultCondition {
    /// Sensor whose sample tripped the monitor.
    pub sensor: String,
    /// The tripping sample.
    pub value: f64,
    /// Threshold in force.
    pub threshold: f64,
    /// Consecutive out-of-band samples at the time of the trip.
    pub consecutive: u32,
}

impl fmt::Display for FaultCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} read {:.2} below {:.2} for {} consecutive samples",
            self.sensor, self.value, self.threshold, self.consecutive
        )
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    /// Current out-of-band run of each matching sensor.
    consecutive: BTreeMap<String, u32>,
    tripped: Option<FaultCondition>,
}

/// Counts consecutive out-of-band samples and latches a trip.
///
/// Every matching sensor has its own debounce counter, so one sample per
/// sweep advances a counter by at most one and an in-band reading on one
/// channel never clears another channel's run. Samples from sensors that
/// do not match the pattern, and NaN samples, leave the counters untouched.
#[derive(Debug)]
pub struct FaultMonitor {
    thresholds: FaultThresholds,
    state: Mutex<MonitorState>,
}

impl FaultMonitor {
    /// Create an untripped monitor.
    #[must_use]
    pub fn new(thresholds: FaultThresholds) -> Self {
        Self {
            thresholds,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Thresholds in force.
    #[must_use]
    pub fn thresholds(&self) -> &FaultThresholds {
        &self.thresholds
    }

    /// Returns true if `sensor` is subject to the fault check.
    #[must_use]
    pub fn matches(&self, sensor: &str) -> bool {
        self.thresholds.matches(sensor)
    }

    /// Feed one sample.
    ///
    /// Returns the condition on the sample that trips the monitor, and
    /// `None` otherwise (including every sample after the trip).
    pub fn observe(&self, sensor: &str, value: f64) -> Option<FaultCondition> {
        if !self.matches(sensor) {
            return None;
        }
        if value.is_nan() {
            debug!(sensor, "Ignoring NaN sample");
            return None;
        }

        let mut state = self.state.lock();
        if state.tripped.is_some() {
            return None;
        }

        if value >= self.thresholds.threshold_low {
            if let Some(cleared) = state.consecutive.remove(sensor) {
                debug!(sensor, value, cleared, "Debounce counter cleared");
            }
            return None;
        }

        let run = state.consecutive.entry(sensor.to_string()).or_insert(0);
        *run = run.saturating_add(1);
        let consecutive = *run;
        trace!(sensor, value, consecutive, "Out-of-band sample");

        if consecutive <= self.thresholds.debounce_limit {
            return None;
        }

        let condition = FaultCondition {
            sensor: sensor.to_string(),
            value,
            threshold: self.thresholds.threshold_low,
            consecutive,
        };
        error!(
            sensor,
            value,
            threshold = self.thresholds.threshold_low,
            consecutive,
            "Fault monitor tripped"
        );
        state.tripped = Some(condition.clone());
        Some(condition)
    }

    /// Returns true once tripped.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.state.lock().tripped.is_some()
    }

    /// The condition that tripped the monitor, if any.
    #[must_use]
    pub fn condition(&self) -> Option<FaultCondition> {
        self.state.lock().tripped.clone()
    }

    /// Longest current out-of-band run across all sensors.
    #[must_use]
    pub fn consecutive(&self) -> u32 {
        self.state
            .lock()
            .consecutive
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Current out-of-band run of one sensor.
    #[must_use]
    pub fn consecutive_for(&self, sensor: &str) -> u32 {
        self.state
            .lock()
            .consecutive
            .get(sensor)
            .copied()
            .unwrap_or(0)
    }

    /// Clear the debounce counter without touching the trip latch.
    ///
    /// Called at the start of every run so a count accumulated before a
    /// pause does not carry over into the resumed run.
    pub fn clear_debounce(&self) {
        self.state.lock().consecutive.clear();
    }

    /// Clear the trip latch and the counter.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if state.tripped.is_some() {
            debug!("Fault monitor reset");
        }
        *state = MonitorState::default();
    }
}
