//! # manifold-fault
//!
//! Debounced fault detection for the manifold durability rig.
//!
//! A leak in the manifold shows up as a sustained drop of the inlet
//! pressure. Single low readings are common (valve transitions, bus
//! glitches) and must not abort a run that has been going for days, so the
//! [`FaultMonitor`] only trips after more than `debounce_limit` consecutive
//! out-of-band samples. Once tripped it stays tripped until
//! [`FaultMonitor::reset`] is called by an operator action.
//!
//! ## Usage
//!
//! ```rust
//! use manifold_fault::{FaultMonitor, FaultThresholds};
//!
//! let monitor = FaultMonitor::new(FaultThresholds {
//!     threshold_low: 30.0,
//!     debounce_limit: 2,
//!     ..FaultThresholds::default()
//! });
//!
//! assert!(monitor.observe("inlet_psi", 20.0).is_none());
//! assert!(monitor.observe("inlet_psi", 20.0).is_none());
//! let condition = monitor.observe("inlet_psi", 20.0);
//! assert!(condition.is_some());
//! assert!(monitor.is_tripped());
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

pub mod monitor;
pub mod prelude;
pub mod thresholds;

pub use monitor::{FaultCondition, FaultMonitor};
pub use thresholds::FaultThresholds;
