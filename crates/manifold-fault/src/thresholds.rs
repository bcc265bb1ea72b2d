//! Fault detection thresholds.

use manifold_errors::{RigError, RigResult};
use serde::{Deserialize, Serialize};

/// Default sensor name pattern.
pub const DEFAULT_SENSOR_PATTERN: &str = "inlet";

/// Default number of consecutive violations tolerated before tripping.
pub const DEFAULT_DEBOUNCE_LIMIT: u32 = 100;

/// Parameters of the debounced low-threshold check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultThresholds {
    /// Case-insensitive substring selecting the fault-relevant sensors.
    pub sensor_pattern: String,
    /// Samples strictly below this value are out of band.
    pub threshold_low: f64,
    /// Consecutive out-of-band samples tolerated; one more trips the monitor.
    pub debounce_limit: u32,
}

impl Default for FaultThresholds {
    fn default() -> Self {
        Self {
            sensor_pattern: DEFAULT_SENSOR_PATTERN.to_string(),
            threshold_low: 0.0,
            debounce_limit: DEFAULT_DEBOUNCE_LIMIT,
        }
    }
}

impl FaultThresholds {
    /// Thresholds for a pressure band: trip below `max_psi - margin_psi`.
    #[must_use]
    pub fn below_max(pattern: impl Into<String>, max_psi: f64, margin_psi: f64, limit: u32) -> Self {
        Self {
            sensor_pattern: pattern.into(),
            threshold_low: max_psi - margin_psi,
            debounce_limit: limit,
        }
    }

    /// Validate the thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Configuration`] for an empty pattern or a
    /// non-finite threshold.
    pub fn validate(&self) -> RigResult<()> {
        if self.sensor_pattern.trim().is_empty() {
            return Err(RigError::configuration(
                "fault.sensor_pattern",
                "must not be empty",
            ));
        }
        if !self.threshold_low.is_finite() {
            return Err(RigError::configuration(
                "fault.threshold_low",
                "must be a finite number",
            ));
        }
        Ok(())
    }

    /// Returns true if `sensor` is subject to the fault check.
    #[must_use]
    pub fn matches(&self, sensor: &str) -> bool {
        sensor
            .to_lowercase()
            .contains(&self.sensor_pattern.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_case_insensitive() {
        let thresholds = FaultThresholds::default();
        assert!(thresholds.matches("Inlet_Pressure"));
        assert!(thresholds.matches("manifold_inlet_psi"));
        assert!(!thresholds.matches("outlet_psi"));
    }

    #[test]
    fn test_below_max() {
        let thresholds = FaultThresholds::below_max("inlet", 35.0, 5.0, 100);
        assert!((thresholds.threshold_low - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let empty = FaultThresholds {
            sensor_pattern: "  ".to_string(),
            ..FaultThresholds::default()
        };
        assert!(empty.validate().is_err_and(|e| e.is_configuration()));

        let nan = FaultThresholds {
            threshold_low: f64::NAN,
            ..FaultThresholds::default()
        };
        assert!(nan.validate().is_err());
        assert!(FaultThresholds::default().validate().is_ok());
    }
}
