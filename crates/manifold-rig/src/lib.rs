//! # manifold-rig
//!
//! Orchestration core of the manifold pressure and thermal durability rig.
//!
//! A run combines three independent activities:
//!
//! - **Pressure**: every pump channel is driven through an on/off duty
//!   cycle. Each on/off pair counts one pressure cycle and the run completes
//!   when the pressure target is reached.
//! - **Fluid and chamber temperature**: each bath alternates between its
//!   maximum and minimum setpoint on its own period, driven by a
//!   [`ResumableTimer`](manifold_timing::ResumableTimer).
//! - **Leak detection**: the DAQ is swept at a fixed interval and a
//!   sustained inlet pressure drop halts the run and writes a checkpoint.
//!
//! [`TestOrchestrator`] ties these together behind a small state machine:
//!
//! ```text
//! Idle -> ProfileGenerated -> Running <-> Paused
//!                               |   \
//!                               |    -> Completed
//!                               -> Faulted -> (manual reset) -> ProfileGenerated
//! ```
//!
//! Hardware is reached only through the traits in [`ports`]; [`sim`] has
//! in-process devices for dry runs and tests.
//!
//! ## Usage
//!
//! ```rust
//! use manifold_rig::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> manifold_errors::RigResult<()> {
//! let pump = Arc::new(SimulatedPump::new("pump:bcm"));
//! let daq = Arc::new(SimulatedDaq::new("daq"));
//! daq.set_value("inlet_psi", 35.0);
//!
//! let config = RigConfig::builder()
//!     .time_unit(Duration::from_millis(5))
//!     .keepalive_cadence(Duration::from_millis(5))
//!     .warmup(None)
//!     .on_phase(83.0, Duration::from_millis(2))
//!     .off_duration(Duration::from_millis(2))
//!     .sample_interval(Duration::from_millis(5))
//!     .completion_grace(Duration::from_millis(5))
//!     .build()?;
//!
//! let rig = TestOrchestrator::new(
//!     config,
//!     RigDevices {
//!         pumps: vec![pump],
//!         daq,
//!         fluid_bath: None,
//!         chamber_bath: None,
//!     },
//!     Arc::new(MemoryCheckpointStore::new()),
//! )?;
//!
//! let profile = TestProfile {
//!     fluid: None,
//!     chamber: None,
//!     ..TestProfile::default()
//! };
//! rig.connect()?;
//! rig.generate_profile(profile, None)?;
//! rig.start()?;
//! assert!(rig.wait_for_state(RigState::Completed, Duration::from_secs(5)));
//! assert_eq!(rig.counters().pressure.current, 10);
//! # Ok(())
//! # }
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod checkpoint;
pub mod config;
pub mod file;
pub mod notify;
pub mod orchestrator;
pub mod ports;
pub mod prelude;
mod pressure;
pub mod profile;
pub mod resume;
mod sampler;
pub mod schedule;
mod serde_secs;
pub mod sim;
pub mod state;

pub use checkpoint::{Checkpoint, CheckpointStore, JsonLinesCheckpointStore, MemoryCheckpointStore};
pub use config::{DutyCycle, FaultConfig, PumpPhase, RigConfig, RigConfigBuilder};
pub use file::{FileFormat, RigFile};
pub use notify::{RigNotification, RigStatus};
pub use orchestrator::{ProfilePlan, RigDevices, TestOrchestrator};
pub use ports::{KeepAliveActuator, PowerPercent, PumpActuator, SensorSource, ThermalActuator};
pub use profile::{PressureProfile, TestProfile, ThermalProfile};
pub use resume::{ManualResume, ThermalResume};
pub use schedule::{ScheduleStep, TemperatureSchedule, calculate_schedule};
pub use state::RigState;

pub use manifold_atomic::{CyclesSnapshot, ProfileKind};
pub use manifold_errors::{RigError, RigResult};
pub use manifold_fault::FaultCondition;
