//! # manifold-atomic
//!
//! Lock-free cycle counters for the manifold durability rig.
//!
//! A durability run advances three counters at very different rates: the
//! pressure counter ticks every few seconds, the fluid and chamber counters
//! every few hours. Each counter has exactly one writer (the loop or timer
//! that owns the profile) and any number of readers (status displays,
//! checkpoint writers), so every value lives in its own atomic and reads are
//! never torn.
//!
//! ## Usage
//!
//! ```rust
//! use manifold_atomic::{CycleCounters, ProfileKind};
//!
//! let counters = CycleCounters::new();
//! counters.get(ProfileKind::Pressure).set_target(10);
//!
//! // Owning loop
//! counters.get(ProfileKind::Pressure).increment();
//!
//! // Presentation thread
//! let snapshot = counters.snapshot();
//! assert_eq!(snapshot.pressure.current, 1);
//! assert!(!snapshot.pressure.is_complete());
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod counters;
pub mod prelude;

pub use counters::{CounterSnapshot, CycleCounter, CycleCounters, CyclesSnapshot, ProfileKind};
