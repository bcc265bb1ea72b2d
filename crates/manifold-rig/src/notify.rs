//! Notifications and status snapshots for presentation layers.

use std::collections::BTreeMap;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use manifold_atomic::CyclesSnapshot;
use manifold_fault::FaultCondition;
use parking_lot::Mutex;

use crate::checkpoint::Checkpoint;
use crate::state::RigState;

/// Something a presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum RigNotification {
    /// The orchestrator changed state.
    StateChanged {
        /// Previous state.
        from: RigState,
        /// New state.
        to: RigState,
    },
    /// The fault monitor tripped and the run was halted.
    Faulted {
        /// The sustained reading.
        condition: FaultCondition,
        /// Progress at the moment of the fault.
        checkpoint: Checkpoint,
        /// Whether the checkpoint reached durable storage.
        persisted: bool,
    },
    /// The pressure target was reached.
    Completed {
        /// Final counter values.
        counters: CyclesSnapshot,
    },
    /// A checkpoint was written.
    CheckpointSaved(Checkpoint),
}

/// Point-in-time view of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RigStatus {
    /// Current state.
    pub state: RigState,
    /// Cycle counters.
    pub counters: CyclesSnapshot,
    /// Time left in the current fluid half-cycle, if the profile is enabled.
    pub fluid_remaining: Option<Duration>,
    /// Time left in the current chamber half-cycle, if the profile is enabled.
    pub chamber_remaining: Option<Duration>,
    /// Latest numeric reading of every sensor seen this run.
    pub latest_readings: BTreeMap<String, f64>,
    /// The fault that halted the run, while faulted.
    pub fault: Option<FaultCondition>,
}

/// Fan-out of notifications to every subscriber.
#[derive(Debug, Default)]
pub(crate) struct Notifier {
    subscribers: Mutex<Vec<Sender<RigNotification>>>,
}

impl Notifier {
    pub(crate) fn subscribe(&self) -> Receiver<RigNotification> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber, dropping the ones that hung up.
    pub(crate) fn publish(&self, notification: &RigNotification) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }
}
