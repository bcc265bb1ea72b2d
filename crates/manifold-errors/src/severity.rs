//! Error severity levels.

use core::fmt;

/// Severity of a [`RigError`](crate::RigError).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, the run continues unaffected.
    Info = 0,
    /// Warning, logged but does not change state.
    Warning = 1,
    /// Error, the attempted operation failed and may be retried.
    Error = 2,
    /// Critical, indicates a design violation and must not be swallowed.
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
