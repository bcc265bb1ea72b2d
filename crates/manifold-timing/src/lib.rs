//! # manifold-timing
//!
//! Time primitives for the manifold durability rig.
//!
//! Every long-running activity of a rig run is built from four pieces:
//!
//! - [`CancelToken`]: a cancellation flag a loop can wait on instead of
//!   sleeping, so that pause and abort are observed within a bounded window.
//! - [`TaskHandle`]: a named worker thread joined with an upper bound. A
//!   loop that overruns the bound surfaces as
//!   [`RigError::ShutdownTimeout`](manifold_errors::RigError::ShutdownTimeout)
//!   instead of being silently abandoned.
//! - [`ResumableTimer`]: a repeating countdown that can be paused and
//!   resumed with its remaining time conserved.
//! - [`KeepAliveDriver`]: re-sends the last commanded value to an actuator
//!   that would otherwise drop to a safe state after a short silence.
//!
//! Timers read time through the [`Clock`] trait so that the conservation
//! arithmetic can be tested with a [`ManualClock`].
//!
//! ## Usage
//!
//! ```rust
//! use manifold_timing::{CancelToken, spawn_task};
//! use std::time::Duration;
//!
//! # fn main() -> manifold_errors::RigResult<()> {
//! let token = CancelToken::new();
//! let worker_token = token.clone();
//! let handle = spawn_task("sampler", move || {
//!     while !worker_token.wait_timeout(Duration::from_millis(5)) {}
//! })?;
//!
//! token.cancel();
//! handle.join_within(Duration::from_secs(1))?;
//! # Ok(())
//! # }
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

pub mod cancel;
pub mod clock;
pub mod keepalive;
pub mod prelude;
pub mod task;
pub mod timer;

pub use cancel::CancelToken;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use keepalive::{CommandSlot, KeepAliveActuator, KeepAliveDriver, PowerPercent};
pub use task::{TaskHandle, spawn_task};
pub use timer::{ResumableTimer, TimerState};
