//! Interfaces of the hardware the rig drives.
//!
//! The orchestrator only talks to these traits. Vendor bindings (bus
//! encoders, DAQ projects, bath serial protocols) live outside this crate;
//! [`crate::sim`] provides in-process implementations.

use manifold_errors::RigResult;

pub use manifold_timing::{KeepAliveActuator, PowerPercent};

/// A pump channel on the pump bus.
///
/// Pumps need their power command re-sent every few hundred milliseconds,
/// so the command half of the interface is [`KeepAliveActuator`].
pub trait PumpActuator: KeepAliveActuator {
    /// Open the connection. Returns whether the pump is reachable.
    fn connect(&self) -> bool;

    /// Returns true while the pump is reachable.
    fn is_connected(&self) -> bool;
}

/// A temperature bath (fluid loop or environmental chamber).
pub trait ThermalActuator: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Open the connection. Returns whether the bath is reachable.
    fn connect(&self) -> bool;

    /// Returns true while the bath is reachable.
    fn is_connected(&self) -> bool;

    /// Switch the bath on.
    ///
    /// # Errors
    ///
    /// Returns a device error if the bath rejects the command.
    fn power_on(&self) -> RigResult<()>;

    /// Switch the bath off.
    ///
    /// # Errors
    ///
    /// Returns a device error if the bath rejects the command.
    fn power_off(&self) -> RigResult<()>;

    /// Command a temperature setpoint in °C.
    ///
    /// # Errors
    ///
    /// Returns a device error if the bath rejects the command.
    fn set_setpoint(&self, celsius: f64) -> RigResult<()>;
}

/// The data acquisition system.
pub trait SensorSource: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Open the connection. Returns whether the DAQ is reachable.
    fn connect(&self) -> bool;

    /// Returns true while the DAQ is reachable.
    fn is_connected(&self) -> bool;

    /// Names of every channel.
    fn list_names(&self) -> Vec<String>;

    /// Latest value of a channel.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::TransientSample`](manifold_errors::RigError::TransientSample)
    /// when the value is unavailable or not numeric.
    fn read(&self, name: &str) -> RigResult<f64>;
}
