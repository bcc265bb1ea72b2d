//! Step-function temperature schedules.
//!
//! A thermal profile alternates between its maximum and minimum setpoint
//! every `period` time units, starting at the maximum. The schedule lists
//! every breakpoint up to and including the one at or before the end of
//! the run, plus the x coordinate where the last step ends.

use std::fmt;

use manifold_errors::{RigError, RigResult};
use serde::{Deserialize, Serialize};

/// Upper bound on breakpoints, far beyond any physical run.
pub const MAX_BREAKPOINTS: usize = 1_000_000;

/// One breakpoint of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStep {
    /// Start of the step in profile time units.
    pub start: f64,
    /// Setpoint held from `start` until the next step.
    pub setpoint: f64,
}

/// A computed step schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSchedule {
    /// Breakpoints in time order.
    pub steps: Vec<ScheduleStep>,
    /// Where the last step ends (`period * steps.len()`).
    pub end: f64,
}

impl TemperatureSchedule {
    /// Number of breakpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the schedule has no breakpoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Setpoint in force at time `t`, if `t` lies within the schedule.
    #[must_use]
    pub fn setpoint_at(&self, t: f64) -> Option<f64> {
        if !(0.0..self.end).contains(&t) {
            return None;
        }
        self.steps
            .iter()
            .take_while(|step| step.start <= t)
            .last()
            .map(|step| step.setpoint)
    }

    /// Corner points of the stepped curve, for plotting.
    #[must_use]
    pub fn plot_points(&self) -> Vec<(f64, f64)> {
        let mut points = Vec::with_capacity(self.steps.len() * 2);
        let mut ends = self.steps.iter().skip(1).map(|s| s.start).chain([self.end]);
        for step in &self.steps {
            points.push((step.start, step.setpoint));
            if let Some(end) = ends.next() {
                points.push((end, step.setpoint));
            }
        }
        points
    }
}

impl fmt::Display for TemperatureSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{:>10.2}  {:>8.2}", step.start, step.setpoint)?;
        }
        write!(f, "{:>10.2}  end", self.end)
    }
}

/// Check thermal parameters, naming fields under `prefix`.
///
/// # Errors
///
/// Returns a configuration error for a non-positive or non-finite period,
/// non-finite bounds, or `max <= min`.
pub fn validate_thermal(prefix: &str, period: f64, min: f64, max: f64) -> RigResult<()> {
    if !period.is_finite() || period <= 0.0 {
        return Err(RigError::configuration(
            format!("{prefix}.period"),
            format!("must be greater than 0, got {period}"),
        ));
    }
    if !min.is_finite() {
        return Err(RigError::configuration(
            format!("{prefix}.min"),
            "must be a finite number",
        ));
    }
    if !max.is_finite() || max <= min {
        return Err(RigError::configuration(
            format!("{prefix}.max"),
            format!("must be greater than min ({min}), got {max}"),
        ));
    }
    Ok(())
}

/// Number of whole periods in `total`.
///
/// # Errors
///
/// Returns a configuration error if `total` is negative or non-finite, or
/// if the count would exceed [`MAX_BREAKPOINTS`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn whole_periods(total: f64, period: f64) -> RigResult<u64> {
    if !total.is_finite() || total < 0.0 {
        return Err(RigError::configuration(
            "total_duration",
            format!("must be a non-negative number, got {total}"),
        ));
    }
    let periods = (total / period).floor();
    if periods >= MAX_BREAKPOINTS as f64 {
        return Err(RigError::configuration(
            "total_duration",
            format!("spans {periods} periods, more than {MAX_BREAKPOINTS}"),
        ));
    }
    // Finite, non-negative and bounded above.
    Ok(periods as u64)
}

/// Compute the step schedule of one thermal profile.
///
/// Breakpoints sit at `k * period` for `k` in `0..=floor(total / period)`;
/// even steps hold `max`, odd steps hold `min`.
///
/// # Errors
///
/// Returns a configuration error for invalid parameters.
///
/// # Example
///
/// ```rust
/// use manifold_rig::schedule::calculate_schedule;
///
/// # fn main() -> manifold_errors::RigResult<()> {
/// let schedule = calculate_schedule(216.0, 18.0, 0.0, 30.0)?;
/// assert_eq!(schedule.len(), 13);
/// assert_eq!(schedule.end, 234.0);
/// # Ok(())
/// # }
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn calculate_schedule(
    total: f64,
    period: f64,
    min: f64,
    max: f64,
) -> RigResult<TemperatureSchedule> {
    validate_thermal("schedule", period, min, max)?;
    let breakpoints = whole_periods(total, period)? + 1;

    let steps = (0..breakpoints)
        .map(|k| ScheduleStep {
            start: k as f64 * period,
            setpoint: if k % 2 == 0 { max } else { min },
        })
        .collect();

    Ok(TemperatureSchedule {
        steps,
        end: breakpoints as f64 * period,
    })
}
