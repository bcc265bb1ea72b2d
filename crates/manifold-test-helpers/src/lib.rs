//! Shared test utilities for the manifold durability rig.
//!
//! - [`mod@must`] - Unwrap helpers with good error messages and `#[track_caller]`
//! - [`timing`] - Polling and tolerance helpers for thread-based tests
//! - [`prelude`] - Convenience re-exports
//!
//! ```toml
//! [dev-dependencies]
//! manifold-test-helpers = { workspace = true }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::unwrap_used, clippy::panic)]

pub mod must;
pub mod prelude;
pub mod timing;

pub use must::*;
pub use timing::*;
