//! What a durability run does: the test profile.

use manifold_atomic::ProfileKind;
use manifold_errors::{RigError, RigResult};
use serde::{Deserialize, Serialize};

use crate::schedule::{TemperatureSchedule, calculate_schedule, validate_thermal, whole_periods};

/// A cycled temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalProfile {
    /// Time units between setpoint changes.
    pub period: f64,
    /// Low setpoint in °C.
    pub min: f64,
    /// High setpoint in °C.
    pub max: f64,
}

impl ThermalProfile {
    /// Create a profile.
    #[must_use]
    pub fn new(period: f64, min: f64, max: f64) -> Self {
        Self { period, min, max }
    }

    /// Setpoint applied when the counter reads `count`: even → max, odd → min.
    #[must_use]
    pub fn setpoint_for(&self, count: u64) -> f64 {
        if count % 2 == 0 { self.max } else { self.min }
    }
}

/// The pressure duty-cycle target and band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureProfile {
    /// Number of on/off cycles to run.
    pub target_cycles: u64,
    /// Expected pressure while the pumps are off.
    pub min_psi: f64,
    /// Expected pressure while the pumps are on.
    pub max_psi: f64,
}

/// A complete test profile.
///
/// Missing fields take the defaults; an explicit `null` disables a thermal
/// profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestProfile {
    /// Length of the thermal part of the run, in time units.
    pub total_duration: f64,
    /// Fluid loop profile; `None` disables it.
    pub fluid: Option<ThermalProfile>,
    /// Environmental chamber profile; `None` disables it.
    pub chamber: Option<ThermalProfile>,
    /// Pressure profile.
    pub pressure: PressureProfile,
}

impl Default for TestProfile {
    fn default() -> Self {
        Self {
            total_duration: 216.0,
            fluid: Some(ThermalProfile::new(18.0, 0.0, 30.0)),
            chamber: Some(ThermalProfile::new(16.0, 0.0, 30.0)),
            pressure: PressureProfile {
                target_cycles: 10,
                min_psi: 15.0,
                max_psi: 35.0,
            },
        }
    }
}

impl TestProfile {
    /// The thermal profile for `kind`, if enabled. Pressure has none.
    #[must_use]
    pub fn thermal(&self, kind: ProfileKind) -> Option<&ThermalProfile> {
        match kind {
            ProfileKind::Fluid => self.fluid.as_ref(),
            ProfileKind::Chamber => self.chamber.as_ref(),
            ProfileKind::Pressure => None,
        }
    }

    /// Validate the profile.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first offending field.
    pub fn validate(&self) -> RigResult<()> {
        if !self.total_duration.is_finite() || self.total_duration <= 0.0 {
            return Err(RigError::configuration(
                "total_duration",
                format!("must be greater than 0, got {}", self.total_duration),
            ));
        }
        for kind in [ProfileKind::Fluid, ProfileKind::Chamber] {
            if let Some(thermal) = self.thermal(kind) {
                validate_thermal(kind.as_str(), thermal.period, thermal.min, thermal.max)?;
                whole_periods(self.total_duration, thermal.period)?;
            }
        }

        let pressure = &self.pressure;
        if pressure.target_cycles == 0 {
            return Err(RigError::configuration(
                "pressure.target_cycles",
                "must be greater than 0",
            ));
        }
        if !pressure.min_psi.is_finite() {
            return Err(RigError::configuration(
                "pressure.min_psi",
                "must be a finite number",
            ));
        }
        if !pressure.max_psi.is_finite() || pressure.max_psi <= pressure.min_psi {
            return Err(RigError::configuration(
                "pressure.max_psi",
                format!(
                    "must be greater than min_psi ({}), got {}",
                    pressure.min_psi, pressure.max_psi
                ),
            ));
        }
        Ok(())
    }

    /// Cycle target of a profile. Disabled thermal profiles have target 0.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid thermal parameters.
    pub fn target(&self, kind: ProfileKind) -> RigResult<u64> {
        match kind {
            ProfileKind::Pressure => Ok(self.pressure.target_cycles),
            ProfileKind::Fluid | ProfileKind::Chamber => match self.thermal(kind) {
                Some(thermal) => whole_periods(self.total_duration, thermal.period),
                None => Ok(0),
            },
        }
    }

    /// Step schedule of a thermal profile, if enabled.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid thermal parameters.
    pub fn schedule(&self, kind: ProfileKind) -> RigResult<Option<TemperatureSchedule>> {
        self.thermal(kind)
            .map(|t| {
                calculate_schedule(self.total_duration, t.period, t.min, t.max).map_err(|e| {
                    match e {
                        RigError::Configuration { field, reason } => RigError::configuration(
                            field.replacen("schedule", kind.as_str(), 1),
                            reason,
                        ),
                        other => other,
                    }
                })
            })
            .transpose()
    }
}
