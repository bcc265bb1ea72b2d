//! Convenience re-exports for test modules.
//!
//! ```rust
//! use manifold_test_helpers::prelude::*;
//!
//! let value = must(Ok::<_, &str>(3));
//! assert_eq!(value, 3);
//! ```

pub use crate::must::{must, must_some};
pub use crate::timing::{assert_duration_near, wait_until};

/// Result type for tests that propagate errors with `?`.
pub type TestResult = Result<(), Box<dyn std::error::Error>>;
