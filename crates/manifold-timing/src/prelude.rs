//! Prelude for manifold-timing.

pub use crate::cancel::CancelToken;
pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::keepalive::{CommandSlot, KeepAliveActuator, KeepAliveDriver, PowerPercent};
pub use crate::task::{TaskHandle, spawn_task};
pub use crate::timer::{ResumableTimer, TimerState};
