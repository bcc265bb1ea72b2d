//! Shared error taxonomy for the manifold durability rig.
//!
//! Every crate in the workspace reports failures through [`RigError`], so a
//! caller driving the orchestrator can classify what went wrong without
//! downcasting:
//!
//! - [`RigError::Configuration`] - invalid profile or rig parameters, raised
//!   before a profile is accepted and never silently clamped
//! - [`RigError::Connectivity`] - a required collaborator is not connected
//! - [`RigError::TransientSample`] - a single unusable sensor reading
//! - [`RigError::ShutdownTimeout`] - a loop missed its cancellation window
//!
//! A sustained out-of-band reading is *not* an error: it is reported as a
//! fault notification by the orchestrator.
//!
//! # Example
//!
//! ```
//! use manifold_errors::prelude::*;
//!
//! fn check_period(period: f64) -> RigResult<f64> {
//!     if period <= 0.0 {
//!         return Err(RigError::configuration("fluid.period", "must be greater than 0"));
//!     }
//!     Ok(period)
//! }
//!
//! assert!(check_period(0.0).is_err_and(|e| e.is_configuration()));
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod prelude;
pub mod severity;

pub use error::RigError;
pub use severity::ErrorSeverity;

/// A specialized `Result` type for rig operations.
pub type RigResult<T> = std::result::Result<T, RigError>;
