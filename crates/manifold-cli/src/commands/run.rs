//! Run a test against simulated devices

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use manifold_rig::sim::{SimulatedBath, SimulatedDaq, SimulatedPump};
use manifold_rig::{
    Checkpoint, CheckpointStore, JsonLinesCheckpointStore, ManualResume, PumpActuator, RigDevices,
    RigError, RigFile, RigNotification, RigState, TestOrchestrator, ThermalActuator, ThermalResume,
};
use tracing::{info, warn};

use crate::commands::config::load_existing;
use crate::commands::{ResumeArgs, RunArgs};
use crate::error::CliError;
use crate::output;

/// Pump channels on the simulated bus.
const PUMP_CHANNELS: [&str; 3] = ["pump:bcm", "pump:powertrain", "pump:external"];

/// Name of the simulated inlet pressure sensor.
const INLET_SENSOR: &str = "inlet_psi";

fn secs(field: &str, value: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(value).map_err(|e| CliError::InvalidArgument(format!("{field}: {e}")))
}

/// Combine the checkpoint (if requested) with explicit values.
pub fn build_resume(
    args: &ResumeArgs,
    latest: Option<&Checkpoint>,
) -> Result<Option<ManualResume>, CliError> {
    if !args.is_requested() {
        return Ok(None);
    }

    let mut resume = match (args.resume_from_checkpoint, latest) {
        (true, Some(checkpoint)) => ManualResume::try_from(checkpoint)?,
        (true, None) => {
            return Err(CliError::InvalidArgument(
                "--resume-from-checkpoint given but no checkpoint is recorded".into(),
            ));
        }
        (false, _) => ManualResume::default(),
    };

    if let Some(count) = args.resume_pressure {
        resume.pressure_count = count;
    }
    if let (Some(count), Some(remaining)) =
        (args.resume_fluid_count, args.resume_fluid_remaining_secs)
    {
        resume.fluid = Some(ThermalResume::new(
            count,
            secs("--resume-fluid-remaining-secs", remaining)?,
        ));
    }
    if let (Some(count), Some(remaining)) =
        (args.resume_chamber_count, args.resume_chamber_remaining_secs)
    {
        resume.chamber = Some(ThermalResume::new(
            count,
            secs("--resume-chamber-remaining-secs", remaining)?,
        ));
    }
    Ok(Some(resume))
}

fn simulated_devices(file: &RigFile, leak_after: Option<Duration>) -> RigDevices {
    let pressure = &file.profile.pressure;
    let daq = Arc::new(SimulatedDaq::new("daq:sim"));
    daq.set_value("outlet_psi", pressure.min_psi);
    match leak_after {
        Some(delay) => {
            let leaking = pressure.max_psi - file.rig.fault.low_margin_psi - 10.0;
            warn!(after = ?delay, leaking, "Simulated leak scheduled");
            daq.schedule_leak(INLET_SENSOR, pressure.max_psi, leaking, delay);
        }
        None => daq.set_value(INLET_SENSOR, pressure.max_psi),
    }

    RigDevices {
        pumps: PUMP_CHANNELS
            .iter()
            .map(|name| Arc::new(SimulatedPump::new(*name)) as Arc<dyn PumpActuator>)
            .collect(),
        daq,
        fluid_bath: file
            .profile
            .fluid
            .map(|_| Arc::new(SimulatedBath::new("bath:fluid")) as Arc<dyn ThermalActuator>),
        chamber_bath: file
            .profile
            .chamber
            .map(|_| Arc::new(SimulatedBath::new("bath:chamber")) as Arc<dyn ThermalActuator>),
    }
}

/// Print notifications until the run reaches a resting state.
fn follow(notifications: &crossbeam::channel::Receiver<RigNotification>) -> RigState {
    let mut last = RigState::Running;
    while let Ok(notification) = notifications.recv() {
        output::print_notification(&notification);
        match notification {
            RigNotification::Faulted { .. } => return RigState::Faulted,
            RigNotification::Completed { .. } => return RigState::Completed,
            RigNotification::StateChanged { to, .. } => {
                last = to;
                if to == RigState::Idle {
                    return to;
                }
            }
            RigNotification::CheckpointSaved(_) => {}
        }
    }
    last
}

/// Operator stop on Ctrl-C. Returns `None` if the run already reached a
/// terminal state, including one reached while the signal was handled.
fn operator_stop(rig: &TestOrchestrator) -> Result<Option<Checkpoint>, CliError> {
    if !rig.state().is_active() {
        return Ok(None);
    }
    match rig.stop() {
        Ok(checkpoint) => Ok(Some(checkpoint)),
        Err(RigError::InvalidTransition { .. }) if !rig.state().is_active() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn execute(args: &RunArgs, path: &Path) -> Result<()> {
    let file = load_existing(path)?;
    file.validate().map_err(CliError::from)?;

    let store = Arc::new(JsonLinesCheckpointStore::new(&file.checkpoint_path));
    let latest = if args.resume.resume_from_checkpoint {
        store.latest().map_err(CliError::from)?
    } else {
        None
    };
    let resume = build_resume(&args.resume, latest.as_ref())?;
    let leak_after = args
        .leak_after_secs
        .map(|s| secs("--leak-after-secs", s))
        .transpose()?;
    let status_every = secs("--status-secs", args.status_secs)?.max(Duration::from_millis(100));

    let rig = Arc::new(
        TestOrchestrator::new(
            file.rig.clone(),
            simulated_devices(&file, leak_after),
            Arc::clone(&store) as Arc<dyn CheckpointStore>,
        )
        .map_err(CliError::from)?,
    );
    let notifications = rig.subscribe();

    rig.connect().map_err(CliError::from)?;
    let plan = rig
        .generate_profile(file.profile.clone(), resume)
        .map_err(CliError::from)?;
    info!(counters = %plan.counters, "Profile ready");
    rig.start().map_err(CliError::from)?;
    println!(
        "Running {} (checkpoints: {}); Ctrl-C stops with a checkpoint",
        path.display(),
        store.path().display()
    );

    let mut watcher = tokio::task::spawn_blocking(move || follow(&notifications));
    let mut ticker = tokio::time::interval(status_every);
    ticker.tick().await;

    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                let stopper = Arc::clone(&rig);
                let stopped = tokio::task::spawn_blocking(move || operator_stop(&stopper))
                    .await
                    .context("Stop task failed")??;
                match stopped {
                    Some(checkpoint) => println!("Stopped by operator at {checkpoint}"),
                    None => println!("Run already ended as {}", rig.state()),
                }
                break watcher.await.context("Notification task failed")?;
            }
            state = &mut watcher => {
                break state.context("Notification task failed")?;
            }
            _ = ticker.tick() => output::print_status(&rig.status()),
        }
    };

    output::print_status(&rig.status());
    drop(rig);
    match outcome {
        RigState::Faulted => Err(CliError::RunFaulted(outcome.to_string()).into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_no_resume_flags_means_fresh_start() -> TestResult {
        assert_eq!(build_resume(&ResumeArgs::default(), None)?, None);
        Ok(())
    }

    #[test]
    fn test_explicit_values_override_checkpoint() -> TestResult {
        let checkpoint = Checkpoint {
            timestamp: 0.0,
            pressure_count: 40,
            fluid_count: 3,
            fluid_remaining_secs: 100.0,
            chamber_count: 2,
            chamber_remaining_secs: 50.0,
        };
        let args = ResumeArgs {
            resume_from_checkpoint: true,
            resume_fluid_count: Some(5),
            resume_fluid_remaining_secs: Some(3600.0),
            ..ResumeArgs::default()
        };

        let resume = build_resume(&args, Some(&checkpoint))?.ok_or("no resume")?;
        assert_eq!(resume.pressure_count, 40);
        assert_eq!(
            resume.fluid,
            Some(ThermalResume::new(5, Duration::from_secs(3600)))
        );
        assert_eq!(
            resume.chamber,
            Some(ThermalResume::new(2, Duration::from_secs(50)))
        );
        Ok(())
    }

    #[test]
    fn test_checkpoint_resume_needs_a_checkpoint() {
        let args = ResumeArgs {
            resume_from_checkpoint: true,
            ..ResumeArgs::default()
        };
        assert!(matches!(
            build_resume(&args, None),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_negative_remaining_is_rejected() {
        let args = ResumeArgs {
            resume_chamber_count: Some(1),
            resume_chamber_remaining_secs: Some(-5.0),
            ..ResumeArgs::default()
        };
        assert!(matches!(
            build_resume(&args, None),
            Err(CliError::InvalidArgument(_))
        ));
    }

    fn fast_file(pressure_cycles: u64) -> Result<RigFile, RigError> {
        let mut file = RigFile::default();
        file.rig = manifold_rig::RigConfig::builder()
            .time_unit(Duration::from_millis(2))
            .keepalive_cadence(Duration::from_millis(10))
            .warmup(None)
            .on_phase(83.0, Duration::from_millis(5))
            .off_duration(Duration::from_millis(5))
            .sample_interval(Duration::from_millis(5))
            .completion_grace(Duration::from_millis(10))
            .autosave_interval(None)
            .build()?;
        file.profile.fluid = None;
        file.profile.chamber = None;
        file.profile.pressure.target_cycles = pressure_cycles;
        Ok(file)
    }

    fn started_rig(file: &RigFile) -> Result<TestOrchestrator, RigError> {
        let rig = TestOrchestrator::new(
            file.rig.clone(),
            simulated_devices(file, None),
            Arc::new(manifold_rig::MemoryCheckpointStore::new()),
        )?;
        rig.connect()?;
        rig.generate_profile(file.profile.clone(), None)?;
        rig.start()?;
        Ok(rig)
    }

    #[test]
    fn test_operator_stop_after_completion_reports_nothing_to_stop() -> TestResult {
        let file = fast_file(2)?;
        let rig = started_rig(&file)?;
        assert!(rig.wait_for_state(RigState::Completed, Duration::from_secs(5)));

        assert_eq!(operator_stop(&rig)?, None);
        assert_eq!(rig.state(), RigState::Completed);
        Ok(())
    }

    #[test]
    fn test_operator_stop_while_running_checkpoints() -> TestResult {
        let file = fast_file(1_000_000)?;
        let rig = started_rig(&file)?;

        let checkpoint = operator_stop(&rig)?.ok_or("no checkpoint")?;
        assert_eq!(checkpoint.pressure_count, rig.counters().pressure.current);
        assert_eq!(rig.state(), RigState::Idle);
        Ok(())
    }
}
