//! Operator-entered resume points.
//!
//! After a fault or crash the operator decides where the run really got
//! to. The values may come straight from a [`Checkpoint`] or be typed in by
//! hand; either way they are validated against the profile and never
//! clamped.

use std::time::Duration;

use manifold_atomic::ProfileKind;
use manifold_errors::{RigError, RigResult};
use serde::{Deserialize, Serialize};

use crate::checkpoint::Checkpoint;
use crate::config::RigConfig;
use crate::profile::TestProfile;
use crate::serde_secs;

/// Resume point of one thermal profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThermalResume {
    /// Completed cycles.
    pub count: u64,
    /// Time left in the current half-cycle. Ignored when `count` is 0: no
    /// half-cycle has begun and the profile starts fresh.
    #[serde(rename = "remaining_secs", with = "serde_secs")]
    pub remaining: Duration,
}

impl ThermalResume {
    /// Create a resume point.
    #[must_use]
    pub fn new(count: u64, remaining: Duration) -> Self {
        Self { count, remaining }
    }
}

/// Where to pick a run back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManualResume {
    /// Completed pressure cycles.
    pub pressure_count: u64,
    /// Fluid resume point; `None` starts the fluid profile fresh.
    pub fluid: Option<ThermalResume>,
    /// Chamber resume point; `None` starts the chamber profile fresh.
    pub chamber: Option<ThermalResume>,
}

impl ManualResume {
    /// Resume point of a thermal profile.
    #[must_use]
    pub fn thermal(&self, kind: ProfileKind) -> Option<ThermalResume> {
        match kind {
            ProfileKind::Fluid => self.fluid,
            ProfileKind::Chamber => self.chamber,
            ProfileKind::Pressure => None,
        }
    }

    /// Check the values against a profile.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pressure count is not below its
    /// target, a thermal count exceeds its target, or a remaining time
    /// exceeds the profile period.
    pub fn validate(&self, profile: &TestProfile, config: &RigConfig) -> RigResult<()> {
        let pressure_target = profile.target(ProfileKind::Pressure)?;
        if self.pressure_count >= pressure_target {
            return Err(RigError::configuration(
                "resume.pressure_count",
                format!(
                    "must be below the target of {pressure_target}, got {}",
                    self.pressure_count
                ),
            ));
        }

        for kind in [ProfileKind::Fluid, ProfileKind::Chamber] {
            let (Some(resume), Some(thermal)) = (self.thermal(kind), profile.thermal(kind)) else {
                continue;
            };
            let target = profile.target(kind)?;
            if resume.count > target {
                return Err(RigError::configuration(
                    format!("resume.{kind}.count"),
                    format!("must not exceed the target of {target}, got {}", resume.count),
                ));
            }
            let period = config.units_to_duration(&format!("{kind}.period"), thermal.period)?;
            if resume.remaining > period {
                return Err(RigError::configuration(
                    format!("resume.{kind}.remaining_secs"),
                    format!(
                        "must not exceed the period of {:.3}s, got {:.3}s",
                        period.as_secs_f64(),
                        resume.remaining.as_secs_f64()
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl TryFrom<&Checkpoint> for ManualResume {
    type Error = RigError;

    fn try_from(checkpoint: &Checkpoint) -> RigResult<Self> {
        let remaining = |field: &str, secs: f64| {
            Duration::try_from_secs_f64(secs)
                .map_err(|e| RigError::configuration(field, e.to_string()))
        };
        Ok(Self {
            pressure_count: checkpoint.pressure_count,
            fluid: Some(ThermalResume::new(
                checkpoint.fluid_count,
                remaining("resume.fluid.remaining_secs", checkpoint.fluid_remaining_secs)?,
            )),
            chamber: Some(ThermalResume::new(
                checkpoint.chamber_count,
                remaining(
                    "resume.chamber.remaining_secs",
                    checkpoint.chamber_remaining_secs,
                )?,
            )),
        })
    }
}
