//! The sensor sweep and fault check loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Sender;
use manifold_errors::RigError;
use manifold_fault::FaultMonitor;
use manifold_timing::CancelToken;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::orchestrator::RigEvent;
use crate::ports::SensorSource;

/// Latest numeric value of every sensor.
pub(crate) type Readings = Arc<Mutex<BTreeMap<String, f64>>>;

pub(crate) struct FaultSampler {
    pub(crate) daq: Arc<dyn SensorSource>,
    pub(crate) monitor: Arc<FaultMonitor>,
    pub(crate) readings: Readings,
    pub(crate) interval: Duration,
    pub(crate) token: CancelToken,
    pub(crate) events: Sender<RigEvent>,
    pub(crate) epoch: u64,
}

impl FaultSampler {
    /// Sweep every channel once. Returns true if the monitor tripped.
    fn sweep(&self) -> bool {
        for name in self.daq.list_names() {
            let value = match self.daq.read(&name) {
                Ok(value) if value.is_finite() => value,
                Ok(value) => {
                    let err = RigError::transient_sample(&name, format!("non-finite value {value}"));
                    warn!(sensor = %name, error = %err, "Discarding sample");
                    continue;
                }
                Err(err) => {
                    warn!(sensor = %name, error = %err, "Discarding sample");
                    continue;
                }
            };

            self.readings.lock().insert(name.clone(), value);

            if let Some(condition) = self.monitor.observe(&name, value) {
                let event = RigEvent::FaultTripped {
                    epoch: self.epoch,
                    condition,
                };
                if self.events.send(event).is_err() {
                    debug!("Supervisor gone before fault report");
                }
                return true;
            }
        }
        false
    }

    pub(crate) fn run(self) {
        debug!(interval_ms = self.interval.as_millis(), "Fault sampler started");
        loop {
            if self.sweep() {
                return;
            }
            if self.token.wait_timeout(self.interval) {
                debug!("Fault sampler cancelled");
                return;
            }
        }
    }
}
