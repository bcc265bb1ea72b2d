//! Keep-alive cadence and shutdown bounds.

use manifold_errors::{RigError, RigResult};
use manifold_test_helpers::prelude::*;
use manifold_timing::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct RecordingPump {
    commands: Mutex<Vec<(Instant, f32)>>,
    started: Mutex<bool>,
}

impl KeepAliveActuator for RecordingPump {
    fn name(&self) -> &str {
        "pump:test"
    }

    fn start(&self) -> RigResult<()> {
        *self.started.lock() = true;
        Ok(())
    }

    fn set_power(&self, power: PowerPercent) -> RigResult<()> {
        self.commands.lock().push((Instant::now(), power.get()));
        Ok(())
    }

    fn stop(&self) -> RigResult<()> {
        *self.started.lock() = false;
        Ok(())
    }
}

#[derive(Debug)]
struct RefusingPump;

impl KeepAliveActuator for RefusingPump {
    fn name(&self) -> &str {
        "pump:refusing"
    }

    fn start(&self) -> RigResult<()> {
        Err(RigError::device("pump:refusing", "interlock open"))
    }

    fn set_power(&self, _power: PowerPercent) -> RigResult<()> {
        Ok(())
    }

    fn stop(&self) -> RigResult<()> {
        Ok(())
    }
}

#[test]
fn test_commands_never_gap_longer_than_cadence() -> TestResult {
    let cadence = Duration::from_millis(20);
    let pump = Arc::new(RecordingPump::default());
    let mut driver = KeepAliveDriver::new(Arc::clone(&pump), cadence);

    driver.set_value(PowerPercent::new(83.0));
    driver.start()?;
    std::thread::sleep(Duration::from_millis(300));
    driver.set_value(PowerPercent::ZERO);
    std::thread::sleep(Duration::from_millis(60));
    driver.stop()?;

    let commands = pump.commands.lock();
    let max_gap = commands
        .windows(2)
        .filter_map(|w| match w {
            [a, b] => Some(b.0 - a.0),
            _ => None,
        })
        .max()
        .unwrap_or_default();
    assert!(
        max_gap <= cadence + Duration::from_millis(25),
        "max gap {max_gap:?}"
    );
    assert!(commands.iter().any(|(_, v)| (*v - 83.0).abs() < f32::EPSILON));
    assert!(!*pump.started.lock());
    Ok(())
}

#[test]
fn test_stop_returns_within_bound() -> TestResult {
    let cadence = Duration::from_millis(200);
    let pump = Arc::new(RecordingPump::default());
    let mut driver =
        KeepAliveDriver::new(Arc::clone(&pump), cadence).with_stop_slack(Duration::from_millis(100));
    driver.start()?;
    std::thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    driver.stop()?;
    assert!(started.elapsed() < cadence + Duration::from_millis(100));

    let sent = pump.commands.lock().len();
    std::thread::sleep(Duration::from_millis(250));
    assert_eq!(pump.commands.lock().len(), sent);
    Ok(())
}

#[test]
fn test_start_failure_leaves_driver_stopped() {
    let mut driver = KeepAliveDriver::new(Arc::new(RefusingPump), Duration::from_millis(10));
    let result = driver.start();
    assert!(matches!(result, Err(RigError::Device { .. })));
    assert!(!driver.is_running());
}

#[test]
fn test_drop_stops_actuator() -> TestResult {
    let pump = Arc::new(RecordingPump::default());
    {
        let mut driver = KeepAliveDriver::new(Arc::clone(&pump), Duration::from_millis(10));
        driver.set_value(PowerPercent::new(60.0));
        driver.start()?;
        std::thread::sleep(Duration::from_millis(30));
    }
    assert!(!*pump.started.lock());
    let last = pump.commands.lock().last().map(|(_, v)| *v);
    assert_eq!(last.map(f32::to_bits), Some(0.0f32.to_bits()));
    Ok(())
}
