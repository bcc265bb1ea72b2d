//! The pressure duty-cycle loop.
//!
//! Each cycle commands the "on" power to every pump channel, holds it,
//! commands zero, holds that, then counts the cycle. The keep-alive drivers
//! carry the commanded value to the hardware; this loop only writes their
//! command slots.

use std::sync::Arc;

use crossbeam::channel::Sender;
use manifold_atomic::{CycleCounters, ProfileKind};
use manifold_timing::{CancelToken, CommandSlot, PowerPercent};
use tracing::{debug, info};

use crate::config::DutyCycle;
use crate::orchestrator::RigEvent;

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureOutcome {
    /// The target was reached.
    Completed,
    /// The run was paused, stopped or faulted.
    Cancelled,
}

pub(crate) struct PressureLoop {
    pub(crate) slots: Vec<CommandSlot>,
    pub(crate) duty: DutyCycle,
    pub(crate) counters: Arc<CycleCounters>,
    pub(crate) token: CancelToken,
    pub(crate) events: Sender<RigEvent>,
    pub(crate) epoch: u64,
}

impl PressureLoop {
    fn command(&self, power: PowerPercent) {
        for slot in &self.slots {
            slot.set(power);
        }
    }

    /// Hold the current command for `phase`, returning false if cancelled.
    fn hold(&self, phase: std::time::Duration) -> bool {
        if self.token.wait_timeout(phase) {
            self.command(PowerPercent::ZERO);
            return false;
        }
        true
    }

    pub(crate) fn run(self) -> PressureOutcome {
        let counter = self.counters.get(ProfileKind::Pressure);

        if let Some(warmup) = self.duty.warmup.filter(|_| !counter.is_complete()) {
            debug!(power = warmup.power_percent, "Pressure warm-up");
            self.command(PowerPercent::new(warmup.power_percent));
            if !self.hold(warmup.duration) {
                return PressureOutcome::Cancelled;
            }
        }

        let on = PowerPercent::new(self.duty.on.power_percent);
        while !counter.is_complete() {
            self.command(on);
            if !self.hold(self.duty.on.duration) {
                return PressureOutcome::Cancelled;
            }
            self.command(PowerPercent::ZERO);
            if !self.hold(self.duty.off) {
                return PressureOutcome::Cancelled;
            }

            let count = counter.increment();
            info!(
                counter = %ProfileKind::Pressure,
                count,
                target = counter.target(),
                "Pressure cycle complete"
            );
        }

        self.command(PowerPercent::ZERO);
        if self
            .events
            .send(RigEvent::PressureComplete { epoch: self.epoch })
            .is_err()
        {
            debug!("Supervisor gone before pressure completion");
        }
        PressureOutcome::Completed
    }
}
