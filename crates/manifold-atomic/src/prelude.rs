//! Prelude for manifold-atomic.

pub use crate::counters::{
    CounterSnapshot, CycleCounter, CycleCounters, CyclesSnapshot, ProfileKind,
};
