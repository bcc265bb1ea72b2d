//! Simulated bench shared by the orchestrator tests.

#![allow(dead_code)]

use manifold_rig::prelude::*;
use manifold_rig::config::RigConfigBuilder;
use std::sync::Arc;
use std::time::Duration;

/// Healthy inlet pressure, above the default 30 psi threshold.
pub const HEALTHY_PSI: f64 = 35.0;

pub struct Bench {
    pub pumps: Vec<Arc<SimulatedPump>>,
    pub daq: Arc<SimulatedDaq>,
    pub fluid_bath: Arc<SimulatedBath>,
    pub chamber_bath: Arc<SimulatedBath>,
    pub store: Arc<MemoryCheckpointStore>,
}

impl Bench {
    pub fn new() -> Self {
        let daq = Arc::new(SimulatedDaq::new("daq"));
        daq.set_value("inlet_psi", HEALTHY_PSI);
        daq.set_value("outlet_psi", HEALTHY_PSI - 1.0);
        Self {
            pumps: vec![
                Arc::new(SimulatedPump::new("pump:bcm")),
                Arc::new(SimulatedPump::new("pump:external")),
            ],
            daq,
            fluid_bath: Arc::new(SimulatedBath::new("bath:fluid")),
            chamber_bath: Arc::new(SimulatedBath::new("bath:chamber")),
            store: Arc::new(MemoryCheckpointStore::new()),
        }
    }

    pub fn devices(&self) -> RigDevices {
        RigDevices {
            pumps: self
                .pumps
                .iter()
                .map(|p| Arc::clone(p) as Arc<dyn PumpActuator>)
                .collect(),
            daq: Arc::clone(&self.daq) as Arc<dyn SensorSource>,
            fluid_bath: Some(Arc::clone(&self.fluid_bath) as Arc<dyn ThermalActuator>),
            chamber_bath: Some(Arc::clone(&self.chamber_bath) as Arc<dyn ThermalActuator>),
        }
    }

    pub fn rig(&self, config: RigConfig) -> RigResult<TestOrchestrator> {
        TestOrchestrator::new(
            config,
            self.devices(),
            Arc::clone(&self.store) as Arc<dyn CheckpointStore>,
        )
    }

    /// A rig with every device connected.
    pub fn connected_rig(&self, config: RigConfig) -> RigResult<TestOrchestrator> {
        let rig = self.rig(config)?;
        rig.connect()?;
        Ok(rig)
    }
}

/// Millisecond-scale rig timing: one profile unit is 2 ms.
pub fn fast_config() -> RigConfigBuilder {
    RigConfig::builder()
        .time_unit(Duration::from_millis(2))
        .keepalive_cadence(Duration::from_millis(10))
        .warmup(None)
        .on_phase(83.0, Duration::from_millis(10))
        .off_duration(Duration::from_millis(10))
        .sample_interval(Duration::from_millis(5))
        .completion_grace(Duration::from_millis(20))
        .autosave_interval(None)
}

/// The reference profile with a custom pressure target.
pub fn profile(pressure_cycles: u64) -> TestProfile {
    let mut profile = TestProfile::default();
    profile.pressure.target_cycles = pressure_cycles;
    profile
}

/// Effectively endless pressure cycling.
pub const ENDLESS: u64 = 1_000_000;

/// Receive notifications until `pick` matches one or `timeout` elapses.
pub fn next_matching<T>(
    rx: &crossbeam::channel::Receiver<RigNotification>,
    timeout: Duration,
    mut pick: impl FnMut(RigNotification) -> Option<T>,
) -> Option<T> {
    let deadline = std::time::Instant::now() + timeout;
    while let Ok(notification) = rx.recv_deadline(deadline) {
        if let Some(found) = pick(notification) {
            return Some(found);
        }
    }
    None
}
