//! Prelude for manifold-errors.
//!
//! ```
//! use manifold_errors::prelude::*;
//!
//! let err = RigError::connectivity(["pump:bcm"]);
//! assert_eq!(err.severity(), ErrorSeverity::Error);
//! ```

pub use crate::RigResult;
pub use crate::error::RigError;
pub use crate::severity::ErrorSeverity;
