//! Run lifecycle against simulated devices.

mod common;

use common::{Bench, ENDLESS, fast_config, next_matching, profile};
use manifold_rig::prelude::*;
use manifold_test_helpers::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(2);

fn drain(rx: &crossbeam::channel::Receiver<RigNotification>) -> Vec<RigNotification> {
    rx.try_iter().collect()
}

#[test]
fn test_generate_profile_sets_targets_and_schedules() -> TestResult {
    let bench = Bench::new();
    let rig = bench.rig(fast_config().build()?)?;
    let notifications = rig.subscribe();

    let plan = rig.generate_profile(profile(10), None)?;

    assert_eq!(rig.state(), RigState::ProfileGenerated);
    assert_eq!(plan.fluid.as_ref().map(TemperatureSchedule::len), Some(13));
    assert_eq!(plan.chamber.as_ref().map(TemperatureSchedule::len), Some(14));
    assert_eq!(plan.counters.pressure.target, 10);
    assert_eq!(plan.counters.fluid.target, 12);
    assert_eq!(plan.counters.chamber.target, 13);
    assert_eq!(plan.counters.pressure.current, 0);
    assert_eq!(
        drain(&notifications),
        vec![RigNotification::StateChanged {
            from: RigState::Idle,
            to: RigState::ProfileGenerated,
        }]
    );
    Ok(())
}

#[test]
fn test_invalid_profile_leaves_rig_untouched() -> TestResult {
    let bench = Bench::new();
    let rig = bench.rig(fast_config().build()?)?;

    let mut zero_period = profile(10);
    zero_period.fluid = Some(ThermalProfile::new(0.0, 0.0, 30.0));
    let err = rig.generate_profile(zero_period, None).err().ok_or("accepted")?;
    insta::assert_snapshot!(err, @"Invalid configuration for 'fluid.period': must be greater than 0, got 0");

    let mut flat = profile(10);
    flat.chamber = Some(ThermalProfile::new(16.0, 30.0, 30.0));
    let err = rig.generate_profile(flat, None).err().ok_or("accepted")?;
    insta::assert_snapshot!(err, @"Invalid configuration for 'chamber.max': must be greater than min (30), got 30");

    assert_eq!(rig.state(), RigState::Idle);
    assert_eq!(rig.counters().pressure.target, 0);
    Ok(())
}

#[test]
fn test_invalid_resume_is_rejected() -> TestResult {
    let bench = Bench::new();
    let rig = bench.rig(fast_config().build()?)?;

    let finished = ManualResume {
        pressure_count: 10,
        ..ManualResume::default()
    };
    let err = rig
        .generate_profile(profile(10), Some(finished))
        .err()
        .ok_or("accepted")?;
    insta::assert_snapshot!(err, @"Invalid configuration for 'resume.pressure_count': must be below the target of 10, got 10");

    let overlong = ManualResume {
        pressure_count: 0,
        fluid: Some(ThermalResume::new(5, Duration::from_millis(37))),
        chamber: None,
    };
    let err = rig
        .generate_profile(profile(10), Some(overlong))
        .err()
        .ok_or("accepted")?;
    insta::assert_snapshot!(err, @"Invalid configuration for 'resume.fluid.remaining_secs': must not exceed the period of 0.036s, got 0.037s");

    assert_eq!(rig.state(), RigState::Idle);
    Ok(())
}

#[test]
fn test_new_rejects_bad_config_and_missing_pumps() -> TestResult {
    let bench = Bench::new();

    let config = RigConfig {
        keepalive_cadence: Duration::ZERO,
        ..RigConfig::default()
    };
    assert!(bench.rig(config).err().is_some_and(|e| e.is_configuration()));

    let mut devices = bench.devices();
    devices.pumps.clear();
    let err = TestOrchestrator::new(
        RigConfig::default(),
        devices,
        Arc::new(MemoryCheckpointStore::new()),
    )
    .err()
    .ok_or("accepted")?;
    assert!(err.is_configuration());
    Ok(())
}

#[test]
fn test_start_requires_every_device_connected() -> TestResult {
    let bench = Bench::new();
    let rig = bench.rig(fast_config().build()?)?;
    rig.generate_profile(profile(ENDLESS), None)?;

    let err = rig.start().err().ok_or("started while disconnected")?;
    assert!(err.is_connectivity());
    assert_eq!(rig.state(), RigState::ProfileGenerated);

    bench.fluid_bath.refuse_connections(true);
    let err = rig.connect().err().ok_or("connected a refusing bath")?;
    assert_eq!(
        err,
        RigError::Connectivity {
            devices: vec!["bath:fluid".to_string()]
        }
    );
    let err = rig.start().err().ok_or("started without the fluid bath")?;
    insta::assert_snapshot!(err, @"Not connected: bath:fluid");
    assert_eq!(rig.state(), RigState::ProfileGenerated);
    assert!(bench.pumps.iter().all(|p| p.start_count() == 0));

    bench.fluid_bath.refuse_connections(false);
    rig.connect()?;
    rig.start()?;
    assert_eq!(rig.state(), RigState::Running);
    rig.stop()?;
    Ok(())
}

#[test]
fn test_disabled_thermal_profiles_need_no_bath() -> TestResult {
    let bench = Bench::new();
    let mut devices = bench.devices();
    devices.fluid_bath = None;
    devices.chamber_bath = None;
    let rig = TestOrchestrator::new(
        fast_config().build()?,
        devices,
        Arc::clone(&bench.store) as Arc<dyn CheckpointStore>,
    )?;
    rig.connect()?;

    let err = rig
        .generate_profile(profile(ENDLESS), None)
        .err()
        .ok_or("accepted a profile without a bath")?;
    assert!(err.is_configuration());

    let pressure_only = TestProfile {
        fluid: None,
        chamber: None,
        ..profile(3)
    };
    let plan = rig.generate_profile(pressure_only, None)?;
    assert!(plan.fluid.is_none());
    assert_eq!(plan.counters.fluid.target, 0);

    rig.start()?;
    assert!(rig.wait_for_state(RigState::Completed, WAIT));
    assert_eq!(rig.counters().pressure.current, 3);
    assert_eq!(rig.counters().fluid.current, 0);
    Ok(())
}

#[test]
fn test_fluid_count_reaches_twelve_and_holds() -> TestResult {
    let bench = Bench::new();
    let rig = bench.connected_rig(fast_config().build()?)?;
    rig.generate_profile(profile(ENDLESS), None)?;

    rig.start()?;
    assert!(wait_until(WAIT, POLL, || rig.counters().fluid.current == 12));
    assert!(wait_until(WAIT, POLL, || rig.counters().chamber.current == 13));

    // One fluid period is 36 ms; the count must not move past the target.
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(rig.counters().fluid.current, 12);
    assert_eq!(rig.counters().chamber.current, 13);

    let setpoints: Vec<f64> = bench.fluid_bath.setpoints().iter().map(|s| s.value).collect();
    assert_eq!(setpoints.len(), 12);
    for (i, setpoint) in setpoints.iter().enumerate() {
        let expected = if i % 2 == 0 { 30.0 } else { 0.0 };
        assert!((setpoint - expected).abs() < f64::EPSILON, "step {i}: {setpoint}");
    }

    assert_eq!(rig.state(), RigState::Running);
    rig.stop()?;
    Ok(())
}

#[test]
fn test_pressure_target_completes_run() -> TestResult {
    let bench = Bench::new();
    let rig = bench.connected_rig(fast_config().build()?)?;
    let notifications = rig.subscribe();
    rig.generate_profile(profile(5), None)?;

    rig.start()?;
    assert!(bench.fluid_bath.is_powered());
    assert!(rig.wait_for_state(RigState::Completed, WAIT));

    let counters = rig.counters();
    assert_eq!(counters.pressure.current, 5);
    assert!(counters.pressure.is_complete());
    for pump in &bench.pumps {
        assert!(!pump.is_enabled());
        assert_eq!(pump.last_power().map(f32::to_bits), Some(0.0f32.to_bits()));
    }
    assert!(!bench.fluid_bath.is_powered());
    assert!(!bench.chamber_bath.is_powered());

    let fluid = counters.fluid.current;
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(rig.counters().fluid.current, fluid);

    let completed = next_matching(&notifications, WAIT, |n| match n {
        RigNotification::Completed { counters } => Some(counters),
        _ => None,
    })
    .ok_or("no completion notification")?;
    assert_eq!(completed.pressure.current, 5);

    rig.generate_profile(profile(5), None)?;
    assert_eq!(rig.counters().pressure.current, 0);
    Ok(())
}

#[test]
fn test_pause_is_refused_while_completion_is_pending() -> TestResult {
    let bench = Bench::new();
    let config = fast_config()
        .completion_grace(Duration::from_millis(400))
        .build()?;
    let rig = bench.connected_rig(config)?;
    rig.generate_profile(profile(3), None)?;
    rig.start()?;

    // Baths power off once the actuators have been halted for completion.
    assert!(wait_until(WAIT, POLL, || !bench.fluid_bath.is_powered()));
    assert_eq!(rig.state(), RigState::Running);
    let counters = rig.counters();

    let err = rig.pause().err().ok_or("pause accepted during completion")?;
    insta::assert_snapshot!(err, @"Cannot pause while completing");

    assert!(rig.wait_for_state(RigState::Completed, WAIT));
    assert_eq!(rig.counters(), counters);
    assert!(matches!(
        rig.start(),
        Err(RigError::InvalidTransition { state: "completed", .. })
    ));
    Ok(())
}

#[test]
fn test_pause_freezes_progress_and_start_resumes() -> TestResult {
    let bench = Bench::new();
    let rig = bench.connected_rig(fast_config().build()?)?;
    rig.generate_profile(profile(ENDLESS), None)?;
    rig.start()?;
    assert!(wait_until(WAIT, POLL, || rig.counters().pressure.current >= 2));

    rig.pause()?;
    assert_eq!(rig.state(), RigState::Paused);
    for pump in &bench.pumps {
        assert!(!pump.is_enabled());
        assert_eq!(pump.last_power().map(f32::to_bits), Some(0.0f32.to_bits()));
    }
    assert!(bench.fluid_bath.is_powered());

    let frozen = rig.status();
    let commands = bench.pumps.iter().map(|p| p.commands().len()).collect::<Vec<_>>();
    std::thread::sleep(Duration::from_millis(60));
    let later = rig.status();
    assert_eq!(later.counters, frozen.counters);
    assert_eq!(later.fluid_remaining, frozen.fluid_remaining);
    assert!(frozen.fluid_remaining.is_some_and(|r| r <= Duration::from_millis(36)));
    assert_eq!(
        bench.pumps.iter().map(|p| p.commands().len()).collect::<Vec<_>>(),
        commands
    );

    let err = rig.pause().err().ok_or("paused twice")?;
    insta::assert_snapshot!(err, @"Cannot pause while paused");

    rig.start()?;
    assert_eq!(rig.state(), RigState::Running);
    assert!(wait_until(WAIT, POLL, || {
        rig.counters().pressure.current > frozen.counters.pressure.current
    }));
    rig.stop()?;
    Ok(())
}

#[test]
fn test_keepalive_reaches_every_pump_while_running() -> TestResult {
    let bench = Bench::new();
    let rig = bench.connected_rig(fast_config().build()?)?;
    rig.generate_profile(profile(ENDLESS), None)?;
    rig.start()?;

    assert!(wait_until(WAIT, POLL, || {
        bench.pumps.iter().all(|p| p.commands().len() >= 10)
    }));
    for pump in &bench.pumps {
        assert!(pump.is_enabled());
        let commands = pump.commands();
        assert!(commands.iter().any(|c| (c.value - 83.0).abs() < f32::EPSILON));
    }

    rig.pause()?;
    let stopped_at = Instant::now();
    std::thread::sleep(Duration::from_millis(40));
    for pump in &bench.pumps {
        assert!(pump.commands().iter().all(|c| c.at <= stopped_at));
    }
    rig.stop()?;
    Ok(())
}

#[test]
fn test_status_reports_latest_readings() -> TestResult {
    let bench = Bench::new();
    let rig = bench.connected_rig(fast_config().build()?)?;
    rig.generate_profile(profile(ENDLESS), None)?;
    bench.daq.set_unavailable("outlet_psi");
    rig.start()?;

    assert!(wait_until(WAIT, POLL, || {
        rig.status().latest_readings.contains_key("inlet_psi")
    }));
    let status = rig.status();
    assert_eq!(status.state, RigState::Running);
    assert_eq!(status.latest_readings.get("inlet_psi"), Some(&common::HEALTHY_PSI));
    assert!(!status.latest_readings.contains_key("outlet_psi"));

    bench.daq.set_value("outlet_psi", 12.5);
    assert!(wait_until(WAIT, POLL, || {
        rig.status().latest_readings.get("outlet_psi") == Some(&12.5)
    }));
    rig.stop()?;
    Ok(())
}

#[test]
fn test_operator_stop_checkpoints_and_returns_to_idle() -> TestResult {
    let bench = Bench::new();
    let rig = bench.connected_rig(fast_config().build()?)?;
    rig.generate_profile(profile(ENDLESS), None)?;
    rig.start()?;
    assert!(wait_until(WAIT, POLL, || rig.counters().pressure.current >= 1));

    let checkpoint = rig.stop()?;

    assert_eq!(rig.state(), RigState::Idle);
    assert_eq!(bench.store.saved().last(), Some(&checkpoint));
    assert!(!bench.fluid_bath.is_powered());
    assert!(bench.pumps.iter().all(|p| !p.is_enabled()));
    assert!(checkpoint.pressure_count >= 1);
    assert!(checkpoint.fluid_remaining_secs <= 0.036);

    let err = rig.start().err().ok_or("started from idle")?;
    insta::assert_snapshot!(err, @"Cannot start while idle");

    let resume = ManualResume::try_from(&checkpoint)?;
    let plan = rig.generate_profile(profile(ENDLESS), Some(resume))?;
    assert_eq!(plan.counters.pressure.current, checkpoint.pressure_count);
    assert_eq!(plan.counters.fluid.current, checkpoint.fluid_count);
    assert_eq!(plan.counters.chamber.current, checkpoint.chamber_count);
    Ok(())
}

#[test]
fn test_checkpoint_needs_a_loaded_profile() -> TestResult {
    let bench = Bench::new();
    let rig = bench.rig(fast_config().build()?)?;
    let notifications = rig.subscribe();

    assert!(matches!(
        rig.checkpoint(),
        Err(RigError::InvalidTransition { .. })
    ));

    rig.generate_profile(profile(10), None)?;
    let checkpoint = rig.checkpoint()?;
    assert_eq!(checkpoint.pressure_count, 0);
    assert_eq!(bench.store.saved(), vec![checkpoint.clone()]);
    assert!(
        drain(&notifications)
            .contains(&RigNotification::CheckpointSaved(checkpoint))
    );
    Ok(())
}

#[test]
fn test_autosave_while_running() -> TestResult {
    let bench = Bench::new();
    let config = fast_config()
        .autosave_interval(Some(Duration::from_millis(20)))
        .build()?;
    let rig = bench.connected_rig(config)?;
    rig.generate_profile(profile(ENDLESS), None)?;
    rig.start()?;

    assert!(wait_until(WAIT, POLL, || bench.store.saved().len() >= 3));

    rig.pause()?;
    let saved = bench.store.saved().len();
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(bench.store.saved().len(), saved);
    rig.stop()?;
    Ok(())
}

#[test]
fn test_drop_while_running_stops_everything() -> TestResult {
    let bench = Bench::new();
    let rig = bench.connected_rig(fast_config().build()?)?;
    rig.generate_profile(profile(ENDLESS), None)?;
    rig.start()?;
    assert!(wait_until(WAIT, POLL, || rig.counters().pressure.current >= 1));

    drop(rig);

    assert!(bench.pumps.iter().all(|p| !p.is_enabled()));
    assert!(!bench.fluid_bath.is_powered());
    let commands = bench.pumps.iter().map(|p| p.commands().len()).collect::<Vec<_>>();
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(
        bench.pumps.iter().map(|p| p.commands().len()).collect::<Vec<_>>(),
        commands
    );
    Ok(())
}
