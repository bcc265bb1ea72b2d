//! Prelude for manifold-rig.

pub use crate::checkpoint::{
    Checkpoint, CheckpointStore, JsonLinesCheckpointStore, MemoryCheckpointStore,
};
pub use crate::config::{DutyCycle, FaultConfig, PumpPhase, RigConfig};
pub use crate::file::RigFile;
pub use crate::notify::{RigNotification, RigStatus};
pub use crate::orchestrator::{ProfilePlan, RigDevices, TestOrchestrator};
pub use crate::ports::{KeepAliveActuator, PowerPercent, PumpActuator, SensorSource, ThermalActuator};
pub use crate::profile::{PressureProfile, TestProfile, ThermalProfile};
pub use crate::resume::{ManualResume, ThermalResume};
pub use crate::schedule::{TemperatureSchedule, calculate_schedule};
pub use crate::sim::{SimulatedBath, SimulatedDaq, SimulatedPump};
pub use crate::state::RigState;

pub use manifold_atomic::{CyclesSnapshot, ProfileKind};
pub use manifold_errors::{RigError, RigResult};
pub use manifold_fault::FaultCondition;
