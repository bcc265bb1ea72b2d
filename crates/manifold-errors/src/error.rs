//! The rig error enum and its constructors.

use std::time::Duration;

use thiserror::Error;

use crate::ErrorSeverity;

/// Errors returned by rig operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RigError {
    /// Invalid profile or rig parameters.
    #[error("Invalid configuration for '{field}': {reason}")]
    Configuration {
        /// Dotted path of the offending field, e.g. `fluid.period`.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// One or more required collaborators are not connected.
    #[error("Not connected: {}", devices.join(", "))]
    Connectivity {
        /// Names of the collaborators that failed to report connected.
        devices: Vec<String>,
    },

    /// A single sensor reading was unavailable or non-numeric.
    #[error("Unusable sample from '{sensor}': {reason}")]
    TransientSample {
        /// Sensor name.
        sensor: String,
        /// Reason the reading was discarded.
        reason: String,
    },

    /// A loop failed to observe cancellation within its bounded window.
    #[error("Task '{task}' did not shut down within {waited:?}")]
    ShutdownTimeout {
        /// Name of the task that overran.
        task: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// The requested operation is not allowed in the current state.
    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        /// Current state name.
        state: &'static str,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// An actuator rejected a command.
    #[error("Device '{device}' failed: {reason}")]
    Device {
        /// Device name.
        device: String,
        /// Failure description.
        reason: String,
    },

    /// Reading or writing durable state failed.
    #[error("Persistence failure at {path}: {reason}")]
    Persistence {
        /// File path involved.
        path: String,
        /// Failure description.
        reason: String,
    },

    /// A worker thread panicked.
    #[error("Task '{task}' panicked")]
    TaskPanicked {
        /// Task name.
        task: String,
    },

    /// A worker thread could not be spawned.
    #[error("Failed to spawn task '{task}': {reason}")]
    TaskSpawn {
        /// Task name.
        task: String,
        /// OS error text.
        reason: String,
    },
}

impl RigError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a connectivity error naming every disconnected collaborator.
    #[must_use]
    pub fn connectivity<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Connectivity {
            devices: devices.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a transient sample error.
    #[must_use]
    pub fn transient_sample(sensor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransientSample {
            sensor: sensor.into(),
            reason: reason.into(),
        }
    }

    /// Create a shutdown timeout error.
    #[must_use]
    pub fn shutdown_timeout(task: impl Into<String>, waited: Duration) -> Self {
        Self::ShutdownTimeout {
            task: task.into(),
            waited,
        }
    }

    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(state: &'static str, operation: &'static str) -> Self {
        Self::InvalidTransition { state, operation }
    }

    /// Create a device error.
    #[must_use]
    pub fn device(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Device {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a persistence error.
    #[must_use]
    pub fn persistence(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a task spawn error.
    #[must_use]
    pub fn task_spawn(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TaskSpawn {
            task: task.into(),
            reason: reason.into(),
        }
    }

    /// Create a task panicked error.
    #[must_use]
    pub fn task_panicked(task: impl Into<String>) -> Self {
        Self::TaskPanicked { task: task.into() }
    }

    /// Severity of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TransientSample { .. } => ErrorSeverity::Warning,
            Self::Configuration { .. }
            | Self::Connectivity { .. }
            | Self::InvalidTransition { .. }
            | Self::Device { .. }
            | Self::Persistence { .. } => ErrorSeverity::Error,
            Self::ShutdownTimeout { .. } | Self::TaskPanicked { .. } | Self::TaskSpawn { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    /// Returns true for configuration errors.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns true for connectivity errors.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }

    /// Returns true if the error indicates a design violation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = RigError::configuration("fluid.period", "must be greater than 0");
        assert!(err.is_configuration());
        assert!(!err.is_connectivity());

        let err = RigError::connectivity(["pump:bcm", "daq"]);
        assert!(err.is_connectivity());
        assert_eq!(err.to_string(), "Not connected: pump:bcm, daq");
    }

    #[test]
    fn test_severity_classification() {
        assert_eq!(
            RigError::transient_sample("inlet_psi", "NaN").severity(),
            ErrorSeverity::Warning
        );
        assert!(RigError::shutdown_timeout("pressure-loop", Duration::from_secs(5)).is_fatal());
        assert!(!RigError::device("bath:fluid", "serial timeout").is_fatal());
    }
}
