//! Rig timing configuration.
//!
//! [`RigConfig`] holds everything about *how* the rig runs (duty cycle,
//! keep-alive cadence, fault debounce) as opposed to *what* it runs, which
//! is the [`TestProfile`](crate::profile::TestProfile).

use std::time::Duration;

use manifold_errors::{RigError, RigResult};
use manifold_fault::FaultThresholds;
use serde::{Deserialize, Serialize};

use crate::serde_secs;

/// One powered phase of the pump duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpPhase {
    /// Commanded pump power, 0 to 100.
    pub power_percent: f32,
    /// How long the phase lasts.
    #[serde(rename = "duration_secs", with = "serde_secs")]
    pub duration: Duration,
}

impl PumpPhase {
    /// Create a phase.
    #[must_use]
    pub fn new(power_percent: f32, duration: Duration) -> Self {
        Self {
            power_percent,
            duration,
        }
    }

    fn validate(&self, field: &str) -> RigResult<()> {
        if !self.power_percent.is_finite() || !(0.0..=100.0).contains(&self.power_percent) {
            return Err(RigError::configuration(
                format!("{field}.power_percent"),
                format!("must be within 0..=100, got {}", self.power_percent),
            ));
        }
        if self.duration.is_zero() {
            return Err(RigError::configuration(
                format!("{field}.duration_secs"),
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// The two-phase pressure cadence plus an optional warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DutyCycle {
    /// Run once per start or resume before the first full cycle.
    pub warmup: Option<PumpPhase>,
    /// Powered half of a cycle.
    pub on: PumpPhase,
    /// Unpowered half of a cycle.
    #[serde(rename = "off_secs", with = "serde_secs")]
    pub off: Duration,
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self {
            warmup: Some(PumpPhase::new(60.0, Duration::from_secs(2))),
            on: PumpPhase::new(83.0, Duration::from_secs(4)),
            off: Duration::from_secs(1),
        }
    }
}

impl DutyCycle {
    /// Length of one full on/off cycle.
    #[must_use]
    pub fn cycle_length(&self) -> Duration {
        self.on.duration + self.off
    }

    /// Validate the duty cycle.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending field.
    pub fn validate(&self) -> RigResult<()> {
        if let Some(warmup) = &self.warmup {
            warmup.validate("duty_cycle.warmup")?;
        }
        self.on.validate("duty_cycle.on")?;
        if self.off.is_zero() {
            return Err(RigError::configuration(
                "duty_cycle.off_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Leak detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Case-insensitive substring selecting the monitored sensors.
    pub sensor_pattern: String,
    /// The monitor trips below `max_psi - low_margin_psi`.
    pub low_margin_psi: f64,
    /// Consecutive low samples tolerated before tripping.
    pub debounce_limit: u32,
    /// Time between sensor sweeps.
    #[serde(rename = "sample_interval_secs", with = "serde_secs")]
    pub sample_interval: Duration,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            sensor_pattern: manifold_fault::thresholds::DEFAULT_SENSOR_PATTERN.to_string(),
            low_margin_psi: 5.0,
            debounce_limit: manifold_fault::thresholds::DEFAULT_DEBOUNCE_LIMIT,
            sample_interval: Duration::from_secs(1),
        }
    }
}

impl FaultConfig {
    /// Monitor thresholds for a profile whose pressure peaks at `max_psi`.
    #[must_use]
    pub fn thresholds(&self, max_psi: f64) -> FaultThresholds {
        FaultThresholds::below_max(
            self.sensor_pattern.clone(),
            max_psi,
            self.low_margin_psi,
            self.debounce_limit,
        )
    }

    /// Validate the fault settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending field.
    pub fn validate(&self) -> RigResult<()> {
        if self.sensor_pattern.trim().is_empty() {
            return Err(RigError::configuration(
                "fault.sensor_pattern",
                "must not be empty",
            ));
        }
        if !self.low_margin_psi.is_finite() || self.low_margin_psi < 0.0 {
            return Err(RigError::configuration(
                "fault.low_margin_psi",
                "must be a non-negative number",
            ));
        }
        if self.sample_interval.is_zero() {
            return Err(RigError::configuration(
                "fault.sample_interval_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// How the rig runs a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Wall-clock length of one profile time unit.
    #[serde(rename = "time_unit_secs", with = "serde_secs")]
    pub time_unit: Duration,
    /// Pump command resend cadence.
    #[serde(rename = "keepalive_cadence_secs", with = "serde_secs")]
    pub keepalive_cadence: Duration,
    /// Pressure duty cycle.
    pub duty_cycle: DutyCycle,
    /// Leak detection.
    pub fault: FaultConfig,
    /// Delay between stopping the actuators and reporting completion.
    #[serde(rename = "completion_grace_secs", with = "serde_secs")]
    pub completion_grace: Duration,
    /// Extra time allowed, beyond a loop's own cadence, for it to exit.
    #[serde(rename = "shutdown_slack_secs", with = "serde_secs")]
    pub shutdown_slack: Duration,
    /// Checkpoint period while running. `None` disables autosave.
    #[serde(rename = "autosave_interval_secs", with = "serde_secs::option")]
    pub autosave_interval: Option<Duration>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            time_unit: Duration::from_secs(3600),
            keepalive_cadence: Duration::from_millis(200),
            duty_cycle: DutyCycle::default(),
            fault: FaultConfig::default(),
            completion_grace: Duration::from_secs(1),
            shutdown_slack: Duration::from_millis(500),
            autosave_interval: Some(Duration::from_secs(600)),
        }
    }
}

impl RigConfig {
    /// Start a builder from the defaults.
    #[must_use]
    pub fn builder() -> RigConfigBuilder {
        RigConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first offending field.
    pub fn validate(&self) -> RigResult<()> {
        if self.time_unit.is_zero() {
            return Err(RigError::configuration(
                "time_unit_secs",
                "must be greater than 0",
            ));
        }
        if self.keepalive_cadence.is_zero() {
            return Err(RigError::configuration(
                "keepalive_cadence_secs",
                "must be greater than 0",
            ));
        }
        if self.autosave_interval.is_some_and(|d| d.is_zero()) {
            return Err(RigError::configuration(
                "autosave_interval_secs",
                "must be greater than 0 when set",
            ));
        }
        self.duty_cycle.validate()?;
        self.fault.validate()
    }

    /// Convert a span of profile time units to wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for negative, non-finite or
    /// overflowing spans.
    pub fn units_to_duration(&self, field: &str, units: f64) -> RigResult<Duration> {
        Duration::try_from_secs_f64(units * self.time_unit.as_secs_f64())
            .map_err(|e| RigError::configuration(field, e.to_string()))
    }

    /// Bound used when joining a loop that sleeps at most `cadence`.
    #[must_use]
    pub fn join_bound(&self, cadence: Duration) -> Duration {
        cadence + self.shutdown_slack
    }
}

/// Builder for [`RigConfig`]; `build` validates.
#[derive(Debug, Clone, Default)]
pub struct RigConfigBuilder {
    config: RigConfig,
}

impl RigConfigBuilder {
    /// Set the wall-clock length of one profile time unit.
    #[must_use]
    pub fn time_unit(mut self, unit: Duration) -> Self {
        self.config.time_unit = unit;
        self
    }

    /// Set the pump keep-alive cadence.
    #[must_use]
    pub fn keepalive_cadence(mut self, cadence: Duration) -> Self {
        self.config.keepalive_cadence = cadence;
        self
    }

    /// Replace the whole duty cycle.
    #[must_use]
    pub fn duty_cycle(mut self, duty_cycle: DutyCycle) -> Self {
        self.config.duty_cycle = duty_cycle;
        self
    }

    /// Set or remove the warm-up phase.
    #[must_use]
    pub fn warmup(mut self, warmup: Option<PumpPhase>) -> Self {
        self.config.duty_cycle.warmup = warmup;
        self
    }

    /// Set the powered phase.
    #[must_use]
    pub fn on_phase(mut self, power_percent: f32, duration: Duration) -> Self {
        self.config.duty_cycle.on = PumpPhase::new(power_percent, duration);
        self
    }

    /// Set the unpowered phase length.
    #[must_use]
    pub fn off_duration(mut self, duration: Duration) -> Self {
        self.config.duty_cycle.off = duration;
        self
    }

    /// Set the monitored sensor pattern.
    #[must_use]
    pub fn fault_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.fault.sensor_pattern = pattern.into();
        self
    }

    /// Set the margin below the maximum pressure that counts as a leak.
    #[must_use]
    pub fn low_margin_psi(mut self, margin: f64) -> Self {
        self.config.fault.low_margin_psi = margin;
        self
    }

    /// Set the debounce limit.
    #[must_use]
    pub fn debounce_limit(mut self, limit: u32) -> Self {
        self.config.fault.debounce_limit = limit;
        self
    }

    /// Set the sensor sweep interval.
    #[must_use]
    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.config.fault.sample_interval = interval;
        self
    }

    /// Set the completion grace delay.
    #[must_use]
    pub fn completion_grace(mut self, grace: Duration) -> Self {
        self.config.completion_grace = grace;
        self
    }

    /// Set the shutdown slack.
    #[must_use]
    pub fn shutdown_slack(mut self, slack: Duration) -> Self {
        self.config.shutdown_slack = slack;
        self
    }

    /// Set or disable autosave.
    #[must_use]
    pub fn autosave_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.autosave_interval = interval;
        self
    }

    /// Validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first offending field.
    pub fn build(self) -> RigResult<RigConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
