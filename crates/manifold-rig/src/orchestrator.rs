//! The test orchestrator.
//!
//! [`TestOrchestrator`] owns the profile-scoped resources of a run (pump
//! keep-alive drivers, thermal timers, fault monitor) and the worker
//! threads that drive them:
//!
//! - the pressure loop, which writes the pump command slots;
//! - one keep-alive thread per pump channel;
//! - one countdown thread per enabled thermal timer;
//! - the fault sampler;
//! - the supervisor, which handles loop events and periodic autosave.
//!
//! Loops never take the orchestrator's lock. They report through a channel
//! to the supervisor, tagging each event with the run epoch they were
//! started in; the epoch advances on every start and halt, so an event
//! from a run that has since been paused or stopped is ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvError, RecvTimeoutError, Sender};
use manifold_atomic::{CycleCounters, CyclesSnapshot, ProfileKind};
use manifold_errors::{RigError, RigResult};
use manifold_fault::{FaultCondition, FaultMonitor};
use manifold_timing::{
    CancelToken, KeepAliveDriver, PowerPercent, ResumableTimer, TaskHandle,
    spawn_task,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::RigConfig;
use crate::notify::{Notifier, RigNotification, RigStatus};
use crate::ports::{PumpActuator, SensorSource, ThermalActuator};
use crate::pressure::{PressureLoop, PressureOutcome};
use crate::profile::{TestProfile, ThermalProfile};
use crate::resume::ManualResume;
use crate::sampler::{FaultSampler, Readings};
use crate::schedule::TemperatureSchedule;
use crate::state::{RigState, StateCell};

/// Extra time allowed for the supervisor to exit on drop.
const SUPERVISOR_JOIN_MARGIN: Duration = Duration::from_secs(2);

const THERMAL_KINDS: [ProfileKind; 2] = [ProfileKind::Fluid, ProfileKind::Chamber];

/// Messages from the loops to the supervisor.
#[derive(Debug)]
pub(crate) enum RigEvent {
    FaultTripped {
        epoch: u64,
        condition: FaultCondition,
    },
    PressureComplete {
        epoch: u64,
    },
    Shutdown,
}

/// The hardware a rig drives.
#[derive(Clone)]
pub struct RigDevices {
    /// Pump channels; all are commanded together by the duty cycle.
    pub pumps: Vec<Arc<dyn PumpActuator>>,
    /// Data acquisition.
    pub daq: Arc<dyn SensorSource>,
    /// Fluid loop bath, required when the fluid profile is enabled.
    pub fluid_bath: Option<Arc<dyn ThermalActuator>>,
    /// Chamber bath, required when the chamber profile is enabled.
    pub chamber_bath: Option<Arc<dyn ThermalActuator>>,
}

impl std::fmt::Debug for RigDevices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigDevices")
            .field(
                "pumps",
                &self.pumps.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("daq", &self.daq.name())
            .field("fluid_bath", &self.fluid_bath.as_ref().map(|b| b.name()))
            .field("chamber_bath", &self.chamber_bath.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl RigDevices {
    /// Bath serving a thermal profile.
    #[must_use]
    pub fn bath(&self, kind: ProfileKind) -> Option<&Arc<dyn ThermalActuator>> {
        match kind {
            ProfileKind::Fluid => self.fluid_bath.as_ref(),
            ProfileKind::Chamber => self.chamber_bath.as_ref(),
            ProfileKind::Pressure => None,
        }
    }
}

/// What `generate_profile` prepared.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePlan {
    /// Fluid schedule, if enabled.
    pub fluid: Option<TemperatureSchedule>,
    /// Chamber schedule, if enabled.
    pub chamber: Option<TemperatureSchedule>,
    /// Counter values and targets the run starts from.
    pub counters: CyclesSnapshot,
}

struct Worker<T> {
    token: CancelToken,
    handle: TaskHandle<T>,
}

impl<T> Worker<T> {
    fn cancel_and_join(self, bound: Duration) -> RigResult<T> {
        self.token.cancel();
        self.handle.join_within(bound)
    }
}

#[derive(Clone, Copy)]
enum TimerAction {
    Pause,
    Stop,
}

/// Resources of the loaded profile.
struct Run {
    profile: TestProfile,
    monitor: Arc<FaultMonitor>,
    fluid_timer: Option<ResumableTimer>,
    chamber_timer: Option<ResumableTimer>,
    reapply_setpoints: bool,
    /// Pressure target reached; the completion grace delay is running.
    completing: bool,
    drivers: Vec<KeepAliveDriver<dyn PumpActuator>>,
    pressure: Option<Worker<PressureOutcome>>,
    sampler: Option<Worker<()>>,
}

impl Run {
    fn timer(&self, kind: ProfileKind) -> Option<&ResumableTimer> {
        match kind {
            ProfileKind::Fluid => self.fluid_timer.as_ref(),
            ProfileKind::Chamber => self.chamber_timer.as_ref(),
            ProfileKind::Pressure => None,
        }
    }

    fn timers(&self) -> impl Iterator<Item = &ResumableTimer> {
        self.fluid_timer.iter().chain(self.chamber_timer.iter())
    }

    fn remaining(&self, kind: ProfileKind) -> Option<Duration> {
        self.timer(kind).map(ResumableTimer::remaining)
    }
}

struct Shared {
    config: RigConfig,
    devices: RigDevices,
    store: Arc<dyn CheckpointStore>,
    counters: Arc<CycleCounters>,
    readings: Readings,
    state: StateCell,
    notifier: Notifier,
    epoch: AtomicU64,
    events: Sender<RigEvent>,
    shutdown: CancelToken,
    fault: Mutex<Option<FaultCondition>>,
    run: Mutex<Option<Run>>,
}

/// Keep the first error, log the rest.
fn keep_first(first: &mut Option<RigError>, result: RigResult<()>) {
    if let Err(e) = result {
        match first {
            None => *first = Some(e),
            Some(_) => warn!(error = %e, "Additional failure while halting"),
        }
    }
}

fn thermal_step(
    kind: ProfileKind,
    counters: &CycleCounters,
    bath: &dyn ThermalActuator,
    thermal: &ThermalProfile,
) {
    let counter = counters.get(kind);
    if counter.is_complete() {
        debug!(counter = %kind, "Thermal target reached, holding setpoint");
        return;
    }

    let setpoint = thermal.setpoint_for(counter.current());
    if let Err(e) = bath.set_setpoint(setpoint) {
        warn!(counter = %kind, bath = bath.name(), setpoint, error = %e, "Setpoint command failed");
    }
    let count = counter.increment();
    info!(
        counter = %kind,
        count,
        target = counter.target(),
        setpoint,
        "Thermal cycle"
    );
}

impl Shared {
    fn transition(&self, to: RigState) {
        let from = self.state.set(to);
        if from != to {
            self.notifier
                .publish(&RigNotification::StateChanged { from, to });
        }
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn advance_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn loop_join_bound(&self) -> Duration {
        self.config.join_bound(self.config.keepalive_cadence)
    }

    fn capture(&self, run: &Run) -> Checkpoint {
        Checkpoint::capture(
            &self.counters.snapshot(),
            run.remaining(ProfileKind::Fluid).unwrap_or_default(),
            run.remaining(ProfileKind::Chamber).unwrap_or_default(),
        )
    }

    fn persist(&self, checkpoint: &Checkpoint) -> RigResult<()> {
        self.store.save(checkpoint)?;
        info!(
            pressure = checkpoint.pressure_count,
            fluid = checkpoint.fluid_count,
            chamber = checkpoint.chamber_count,
            "Checkpoint saved"
        );
        self.notifier
            .publish(&RigNotification::CheckpointSaved(checkpoint.clone()));
        Ok(())
    }

    fn enabled_baths<'a>(
        &'a self,
        profile: &'a TestProfile,
    ) -> impl Iterator<Item = (ProfileKind, &'a Arc<dyn ThermalActuator>)> + 'a {
        THERMAL_KINDS.into_iter().filter_map(move |kind| {
            profile.thermal(kind)?;
            self.devices.bath(kind).map(|bath| (kind, bath))
        })
    }

    fn power_off_baths(&self, profile: &TestProfile) {
        for (kind, bath) in self.enabled_baths(profile) {
            if let Err(e) = bath.power_off() {
                warn!(counter = %kind, bath = bath.name(), error = %e, "Bath power off failed");
            }
        }
    }

    /// Stop every loop of the current run. All steps are attempted; the
    /// first failure is returned.
    fn halt(&self, run: &mut Run, timers: TimerAction) -> RigResult<()> {
        self.advance_epoch();
        let bound = self.loop_join_bound();
        let mut first = None;

        if let Some(pressure) = run.pressure.take() {
            let outcome = pressure.cancel_and_join(bound);
            if let Ok(outcome) = &outcome {
                debug!(?outcome, "Pressure loop joined");
            }
            keep_first(&mut first, outcome.map(|_| ()));
        }
        for driver in &mut run.drivers {
            keep_first(&mut first, driver.stop());
        }
        for timer in run.timers() {
            let result = match timers {
                TimerAction::Pause => timer.pause().map(|_| ()),
                TimerAction::Stop => timer.stop(),
            };
            keep_first(&mut first, result);
        }
        if let Some(sampler) = run.sampler.take() {
            keep_first(&mut first, sampler.cancel_and_join(bound));
        }

        first.map_or(Ok(()), Err)
    }

    /// Release a run that is no longer needed.
    fn dispose(&self, mut run: Run) {
        if let Err(e) = self.halt(&mut run, TimerAction::Stop) {
            error!(error = %e, "Failed to release previous run cleanly");
        }
    }

    fn disconnected(&self, profile: &TestProfile) -> Vec<String> {
        let mut missing: Vec<String> = self
            .devices
            .pumps
            .iter()
            .filter(|pump| !pump.is_connected())
            .map(|pump| pump.name().to_string())
            .collect();
        if !self.devices.daq.is_connected() {
            missing.push(self.devices.daq.name().to_string());
        }
        for kind in THERMAL_KINDS {
            if profile.thermal(kind).is_none() {
                continue;
            }
            match self.devices.bath(kind) {
                Some(bath) if bath.is_connected() => {}
                Some(bath) => missing.push(bath.name().to_string()),
                None => missing.push(format!("{kind} bath")),
            }
        }
        missing
    }

    /// Validate and install a profile. Nothing changes unless every check
    /// passes.
    fn prepare(
        &self,
        slot: &mut Option<Run>,
        profile: TestProfile,
        resume: Option<ManualResume>,
    ) -> RigResult<ProfilePlan> {
        profile.validate()?;
        if let Some(resume) = &resume {
            resume.validate(&profile, &self.config)?;
        }

        let mut intervals = [None, None];
        for (slot_index, kind) in THERMAL_KINDS.into_iter().enumerate() {
            let Some(thermal) = profile.thermal(kind) else {
                continue;
            };
            if self.devices.bath(kind).is_none() {
                return Err(RigError::configuration(
                    kind.as_str(),
                    "profile enabled but no bath configured",
                ));
            }
            let field = format!("{kind}.period");
            let interval = self.config.units_to_duration(&field, thermal.period)?;
            if interval.is_zero() {
                return Err(RigError::configuration(field, "rounds to zero time"));
            }
            if let Some(entry) = intervals.get_mut(slot_index) {
                *entry = Some(interval);
            }
        }
        let fluid = profile.schedule(ProfileKind::Fluid)?;
        let chamber = profile.schedule(ProfileKind::Chamber)?;

        if let Some(previous) = slot.take() {
            self.dispose(previous);
        }

        for kind in ProfileKind::ALL {
            let counter = self.counters.get(kind);
            counter.set_target(profile.target(kind)?);
            let start = match (kind, &resume) {
                (ProfileKind::Pressure, Some(r)) => r.pressure_count,
                (_, Some(r)) => r.thermal(kind).map_or(0, |t| t.count),
                (_, None) => 0,
            };
            counter.force_set(start);
        }

        let mut timers = [None, None];
        for ((kind, interval), timer_slot) in THERMAL_KINDS
            .into_iter()
            .zip(intervals)
            .zip(timers.iter_mut())
        {
            let (Some(interval), Some(thermal), Some(bath)) =
                (interval, profile.thermal(kind).copied(), self.devices.bath(kind))
            else {
                continue;
            };
            let counters = Arc::clone(&self.counters);
            let bath = Arc::clone(bath);
            let timer = ResumableTimer::new(kind.as_str(), interval, move || {
                thermal_step(kind, &counters, bath.as_ref(), &thermal);
            });
            // Count 0 means no half-cycle has begun, so the timer starts
            // fresh and its first fire applies the opening setpoint.
            if let Some(point) = resume
                .as_ref()
                .and_then(|r| r.thermal(kind))
                .filter(|point| point.count > 0)
            {
                timer.restore(point.remaining)?;
            }
            *timer_slot = Some(timer);
        }
        let [fluid_timer, chamber_timer] = timers;

        let drivers = self
            .devices
            .pumps
            .iter()
            .map(|pump| {
                KeepAliveDriver::new(Arc::clone(pump), self.config.keepalive_cadence)
                    .with_stop_slack(self.config.shutdown_slack)
            })
            .collect();

        let monitor = Arc::new(FaultMonitor::new(
            self.config.fault.thresholds(profile.pressure.max_psi),
        ));

        self.readings.lock().clear();
        *self.fault.lock() = None;

        info!(
            total = profile.total_duration,
            pressure_target = profile.pressure.target_cycles,
            fluid = profile.fluid.is_some(),
            chamber = profile.chamber.is_some(),
            resumed = resume.is_some(),
            "Profile generated"
        );

        *slot = Some(Run {
            profile,
            monitor,
            fluid_timer,
            chamber_timer,
            reapply_setpoints: resume.is_some(),
            completing: false,
            drivers,
            pressure: None,
            sampler: None,
        });

        Ok(ProfilePlan {
            fluid,
            chamber,
            counters: self.counters.snapshot(),
        })
    }

    /// Start every loop for `epoch`.
    fn launch(&self, run: &mut Run, epoch: u64) -> RigResult<()> {
        let mut slots = Vec::with_capacity(run.drivers.len());
        for driver in &mut run.drivers {
            driver.set_value(PowerPercent::ZERO);
            driver.start()?;
            slots.push(driver.slot());
        }

        let token = CancelToken::new();
        let pressure = PressureLoop {
            slots,
            duty: self.config.duty_cycle,
            counters: Arc::clone(&self.counters),
            token: token.clone(),
            events: self.events.clone(),
            epoch,
        };
        let handle = spawn_task("pressure-loop", move || pressure.run())?;
        run.pressure = Some(Worker { token, handle });

        for timer in run.timers() {
            timer.start()?;
        }

        let token = CancelToken::new();
        let sampler = FaultSampler {
            daq: Arc::clone(&self.devices.daq),
            monitor: Arc::clone(&run.monitor),
            readings: Arc::clone(&self.readings),
            interval: self.config.fault.sample_interval,
            token: token.clone(),
            events: self.events.clone(),
            epoch,
        };
        let handle = spawn_task("fault-sampler", move || sampler.run())?;
        run.sampler = Some(Worker { token, handle });
        Ok(())
    }

    fn reapply_setpoints(&self, run: &Run) {
        for (kind, bath) in self.enabled_baths(&run.profile) {
            let count = self.counters.get(kind).current();
            let Some(thermal) = run.profile.thermal(kind) else {
                continue;
            };
            if count == 0 {
                continue;
            }
            let setpoint = thermal.setpoint_for(count - 1);
            match bath.set_setpoint(setpoint) {
                Ok(()) => info!(counter = %kind, count, setpoint, "Setpoint restored"),
                Err(e) => warn!(counter = %kind, setpoint, error = %e, "Setpoint restore failed"),
            }
        }
    }

    fn on_fault(&self, epoch: u64, condition: FaultCondition) {
        let mut guard = self.run.lock();
        if epoch != self.current_epoch() || self.state.get() != RigState::Running {
            debug!(epoch, "Ignoring fault from a finished run");
            return;
        }
        let Some(run) = guard.as_mut() else {
            return;
        };

        error!(
            sensor = %condition.sensor,
            value = condition.value,
            threshold = condition.threshold,
            "Leak detected, halting run"
        );
        if let Err(e) = self.halt(run, TimerAction::Pause) {
            error!(error = %e, "Halt after fault did not complete cleanly");
        }

        let checkpoint = self.capture(run);
        let persisted = match self.persist(&checkpoint) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Fault checkpoint was not persisted");
                false
            }
        };

        *self.fault.lock() = Some(condition.clone());
        self.transition(RigState::Faulted);
        self.notifier.publish(&RigNotification::Faulted {
            condition,
            checkpoint,
            persisted,
        });
    }

    fn on_pressure_complete(&self, epoch: u64) {
        let settled = {
            let mut guard = self.run.lock();
            if epoch != self.current_epoch() || self.state.get() != RigState::Running {
                debug!(epoch, "Ignoring completion from a finished run");
                return;
            }
            let Some(run) = guard.as_mut() else {
                return;
            };
            info!("Pressure target reached, stopping actuators");
            run.completing = true;
            if let Err(e) = self.halt(run, TimerAction::Stop) {
                error!(error = %e, "Halt after completion did not complete cleanly");
            }
            self.power_off_baths(&run.profile);
            self.current_epoch()
        };

        if self.shutdown.wait_timeout(self.config.completion_grace) {
            return;
        }

        let _guard = self.run.lock();
        if settled != self.current_epoch() || self.state.get() != RigState::Running {
            debug!("Run changed during completion grace");
            return;
        }
        self.transition(RigState::Completed);
        let counters = self.counters.snapshot();
        info!(%counters, "Run complete");
        self.notifier
            .publish(&RigNotification::Completed { counters });
    }

    fn autosave(&self) {
        let guard = self.run.lock();
        if self.state.get() != RigState::Running {
            return;
        }
        let Some(run) = guard.as_ref() else {
            return;
        };
        let checkpoint = self.capture(run);
        if let Err(e) = self.persist(&checkpoint) {
            warn!(error = %e, "Autosave failed");
        }
    }

    fn supervise(&self, events: &Receiver<RigEvent>) {
        let autosave = self.config.autosave_interval;
        let mut next_autosave = autosave.map(|every| Instant::now() + every);

        loop {
            let received = match next_autosave {
                Some(at) => events.recv_deadline(at),
                None => events
                    .recv()
                    .map_err(|RecvError| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(RigEvent::FaultTripped { epoch, condition }) => self.on_fault(epoch, condition),
                Ok(RigEvent::PressureComplete { epoch }) => self.on_pressure_complete(epoch),
                Ok(RigEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("Supervisor exiting");
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.autosave();
                    next_autosave = autosave.map(|every| Instant::now() + every);
                }
            }
        }
    }
}

/// Runs a durability test: one pressure duty cycle, up to two thermal
/// profiles, leak detection and checkpointing.
///
/// All operations take `&self` and may be called from any thread.
///
/// # Example
///
/// ```rust
/// use manifold_rig::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> manifold_errors::RigResult<()> {
/// let devices = RigDevices {
///     pumps: vec![Arc::new(SimulatedPump::new("pump:bcm"))],
///     daq: Arc::new(SimulatedDaq::new("daq")),
///     fluid_bath: Some(Arc::new(SimulatedBath::new("bath:fluid"))),
///     chamber_bath: Some(Arc::new(SimulatedBath::new("bath:chamber"))),
/// };
/// let rig = TestOrchestrator::new(
///     RigConfig::default(),
///     devices,
///     Arc::new(MemoryCheckpointStore::new()),
/// )?;
///
/// rig.connect()?;
/// let plan = rig.generate_profile(TestProfile::default(), None)?;
/// assert_eq!(plan.fluid.map(|s| s.len()), Some(13));
/// assert_eq!(rig.state(), RigState::ProfileGenerated);
/// # Ok(())
/// # }
/// ```
pub struct TestOrchestrator {
    shared: Arc<Shared>,
    supervisor: Option<TaskHandle<()>>,
}

impl std::fmt::Debug for TestOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestOrchestrator")
            .field("state", &self.shared.state.get())
            .field("devices", &self.shared.devices)
            .finish_non_exhaustive()
    }
}

impl TestOrchestrator {
    /// Create an idle orchestrator and start its supervisor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid config or an empty pump
    /// list, or [`RigError::TaskSpawn`] if the supervisor cannot start.
    pub fn new(
        config: RigConfig,
        devices: RigDevices,
        store: Arc<dyn CheckpointStore>,
    ) -> RigResult<Self> {
        config.validate()?;
        if devices.pumps.is_empty() {
            return Err(RigError::configuration(
                "pumps",
                "at least one pump channel is required",
            ));
        }

        let (events_tx, events_rx) = channel::unbounded();
        let shared = Arc::new(Shared {
            config,
            devices,
            store,
            counters: Arc::new(CycleCounters::new()),
            readings: Readings::default(),
            state: StateCell::new(),
            notifier: Notifier::default(),
            epoch: AtomicU64::new(0),
            events: events_tx,
            shutdown: CancelToken::new(),
            fault: Mutex::new(None),
            run: Mutex::new(None),
        });

        let supervisor_shared = Arc::clone(&shared);
        let supervisor = spawn_task("rig-supervisor", move || {
            supervisor_shared.supervise(&events_rx);
        })?;

        info!(devices = ?shared.devices, "Orchestrator ready");
        Ok(Self {
            shared,
            supervisor: Some(supervisor),
        })
    }

    /// Rig configuration.
    #[must_use]
    pub fn config(&self) -> &RigConfig {
        &self.shared.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RigState {
        self.shared.state.get()
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> CyclesSnapshot {
        self.shared.counters.snapshot()
    }

    /// Receive notifications from now on.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<RigNotification> {
        self.shared.notifier.subscribe()
    }

    /// Block until the state equals `target` or `timeout` elapses.
    #[must_use]
    pub fn wait_for_state(&self, target: RigState, timeout: Duration) -> bool {
        self.shared.state.wait_for(target, timeout)
    }

    /// Connect every configured device.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Connectivity`] naming every device that failed.
    pub fn connect(&self) -> RigResult<()> {
        let devices = &self.shared.devices;
        let mut failed = Vec::new();

        for pump in &devices.pumps {
            if !pump.connect() {
                failed.push(pump.name().to_string());
            }
        }
        if !devices.daq.connect() {
            failed.push(devices.daq.name().to_string());
        }
        for bath in devices.fluid_bath.iter().chain(devices.chamber_bath.iter()) {
            if !bath.connect() {
                failed.push(bath.name().to_string());
            }
        }

        if failed.is_empty() {
            info!("All devices connected");
            Ok(())
        } else {
            warn!(failed = ?failed, "Device connection failed");
            Err(RigError::connectivity(failed))
        }
    }

    /// Load a profile, optionally resuming from operator-supplied values.
    ///
    /// Without a resume point every counter starts at zero and both timers
    /// start fresh. With one, counters are set from it and each supplied
    /// thermal timer is restored paused with its remaining time.
    ///
    /// # Errors
    ///
    /// - [`RigError::InvalidTransition`] unless idle, profile generated or
    ///   completed.
    /// - [`RigError::Configuration`] for invalid profile or resume values;
    ///   the orchestrator is left unchanged.
    pub fn generate_profile(
        &self,
        profile: TestProfile,
        resume: Option<ManualResume>,
    ) -> RigResult<ProfilePlan> {
        let shared = &self.shared;
        let mut guard = shared.run.lock();
        let state = shared.state.get();
        if !state.can_generate() {
            return Err(RigError::invalid_transition(
                state.as_str(),
                "generate a profile",
            ));
        }

        let plan = shared.prepare(&mut guard, profile, resume)?;
        shared.transition(RigState::ProfileGenerated);
        Ok(plan)
    }

    /// Start or resume the run.
    ///
    /// # Errors
    ///
    /// - [`RigError::InvalidTransition`] unless profile generated or paused.
    /// - [`RigError::Connectivity`] if a required device is not connected;
    ///   the state does not change.
    /// - Device or task errors from starting the loops; everything already
    ///   started is halted again and the state does not change.
    pub fn start(&self) -> RigResult<()> {
        let shared = &self.shared;
        let mut guard = shared.run.lock();
        let state = shared.state.get();
        if !state.can_start() {
            return Err(RigError::invalid_transition(state.as_str(), "start"));
        }
        let Some(run) = guard.as_mut() else {
            return Err(RigError::invalid_transition(state.as_str(), "start"));
        };

        let missing = shared.disconnected(&run.profile);
        if !missing.is_empty() {
            warn!(missing = ?missing, "Refusing to start");
            return Err(RigError::connectivity(missing));
        }

        for (_, bath) in shared.enabled_baths(&run.profile) {
            bath.power_on()?;
        }
        if run.reapply_setpoints {
            shared.reapply_setpoints(run);
            run.reapply_setpoints = false;
        }

        run.monitor.clear_debounce();
        let epoch = shared.advance_epoch();
        if let Err(e) = shared.launch(run, epoch) {
            error!(error = %e, "Start failed, halting partially started run");
            if let Err(halt) = shared.halt(run, TimerAction::Pause) {
                error!(error = %halt, "Halt after failed start did not complete cleanly");
            }
            return Err(e);
        }

        info!(epoch, counters = %shared.counters.snapshot(), "Run started");
        shared.transition(RigState::Running);
        Ok(())
    }

    /// Pause the run, keeping counts and timer progress.
    ///
    /// Returns once every loop has exited. Baths stay powered at their
    /// current setpoint.
    ///
    /// # Errors
    ///
    /// - [`RigError::InvalidTransition`] unless running, or once the pressure
    ///   target is reached and completion is pending.
    /// - [`RigError::ShutdownTimeout`] if a loop overran its exit bound. The
    ///   run is still paused.
    pub fn pause(&self) -> RigResult<()> {
        let shared = &self.shared;
        let mut guard = shared.run.lock();
        let state = shared.state.get();
        let (RigState::Running, Some(run)) = (state, guard.as_mut()) else {
            return Err(RigError::invalid_transition(state.as_str(), "pause"));
        };
        if run.completing {
            return Err(RigError::invalid_transition("completing", "pause"));
        }

        let result = shared.halt(run, TimerAction::Pause);
        shared.transition(RigState::Paused);
        result
    }

    /// Abort the run: halt, write a checkpoint, power off the baths and
    /// return to idle.
    ///
    /// # Errors
    ///
    /// - [`RigError::InvalidTransition`] unless running or paused.
    /// - The first halt or persistence failure. The orchestrator is idle
    ///   regardless.
    pub fn stop(&self) -> RigResult<Checkpoint> {
        let shared = &self.shared;
        let mut guard = shared.run.lock();
        let state = shared.state.get();
        if !state.is_active() {
            return Err(RigError::invalid_transition(state.as_str(), "stop"));
        }
        let Some(mut run) = guard.take() else {
            return Err(RigError::invalid_transition(state.as_str(), "stop"));
        };

        let mut first = None;
        keep_first(&mut first, shared.halt(&mut run, TimerAction::Pause));
        let checkpoint = shared.capture(&run);
        keep_first(&mut first, shared.persist(&checkpoint));

        shared.power_off_baths(&run.profile);
        shared.dispose(run);
        warn!(%checkpoint, "Run stopped by operator");
        shared.transition(RigState::Idle);

        first.map_or(Ok(checkpoint), Err)
    }

    /// Leave the faulted state with operator-adjudicated progress.
    ///
    /// The fault monitor is re-armed and the loaded profile is prepared
    /// again from `resume`.
    ///
    /// # Errors
    ///
    /// - [`RigError::InvalidTransition`] unless faulted.
    /// - [`RigError::Configuration`] for invalid resume values; the
    ///   orchestrator stays faulted.
    pub fn manual_reset(&self, resume: ManualResume) -> RigResult<ProfilePlan> {
        let shared = &self.shared;
        let mut guard = shared.run.lock();
        let state = shared.state.get();
        let (RigState::Faulted, Some(run)) = (state, guard.as_ref()) else {
            return Err(RigError::invalid_transition(state.as_str(), "reset"));
        };

        let profile = run.profile.clone();
        let plan = shared.prepare(&mut guard, profile, Some(resume))?;
        info!("Fault cleared by operator");
        shared.transition(RigState::ProfileGenerated);
        Ok(plan)
    }

    /// Capture and persist a checkpoint of the loaded run.
    ///
    /// # Errors
    ///
    /// - [`RigError::InvalidTransition`] if no profile is loaded.
    /// - [`RigError::Persistence`] if the store fails.
    pub fn checkpoint(&self) -> RigResult<Checkpoint> {
        let shared = &self.shared;
        let guard = shared.run.lock();
        let Some(run) = guard.as_ref() else {
            return Err(RigError::invalid_transition(
                shared.state.get().as_str(),
                "checkpoint",
            ));
        };
        let checkpoint = shared.capture(run);
        shared.persist(&checkpoint)?;
        Ok(checkpoint)
    }

    /// Snapshot for presentation.
    #[must_use]
    pub fn status(&self) -> RigStatus {
        let shared = &self.shared;
        let (fluid_remaining, chamber_remaining) = {
            let guard = shared.run.lock();
            guard.as_ref().map_or((None, None), |run| {
                (
                    run.remaining(ProfileKind::Fluid),
                    run.remaining(ProfileKind::Chamber),
                )
            })
        };
        RigStatus {
            state: shared.state.get(),
            counters: shared.counters.snapshot(),
            fluid_remaining,
            chamber_remaining,
            latest_readings: shared.readings.lock().clone(),
            fault: shared.fault.lock().clone(),
        }
    }
}

impl Drop for TestOrchestrator {
    fn drop(&mut self) {
        let shared = &self.shared;
        shared.shutdown.cancel();
        if shared.events.send(RigEvent::Shutdown).is_err() {
            debug!("Supervisor already gone");
        }
        if let Some(supervisor) = self.supervisor.take() {
            let bound = shared.config.completion_grace
                + shared.config.shutdown_slack
                + SUPERVISOR_JOIN_MARGIN;
            if let Err(e) = supervisor.join_within(bound) {
                error!(error = %e, "Supervisor did not exit");
            }
        }

        let mut guard = shared.run.lock();
        if let Some(run) = guard.take() {
            if shared.state.get() == RigState::Running {
                warn!("Orchestrator dropped while running, forcing stop");
            }
            shared.power_off_baths(&run.profile);
            shared.dispose(run);
        }
    }
}
