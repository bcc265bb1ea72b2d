//! Prelude for manifold-fault.

pub use crate::monitor::{FaultCondition, FaultMonitor};
pub use crate::thresholds::FaultThresholds;
