//! Polling and tolerance helpers for tests that run real threads.
//!
//! Thread-based tests cannot assert exact instants; they wait for a
//! condition with a deadline and compare durations within a tolerance.

use std::time::{Duration, Instant};

/// Poll `condition` every `poll` until it holds or `timeout` elapses.
///
/// Returns whether the condition became true.
///
/// ```rust
/// use manifold_test_helpers::wait_until;
/// use std::time::Duration;
///
/// assert!(wait_until(Duration::from_millis(50), Duration::from_millis(1), || true));
/// ```
pub fn wait_until<F>(timeout: Duration, poll: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return condition();
        }
        std::thread::sleep(poll);
    }
}

/// Assert that `actual` is within `tolerance` of `expected`.
///
/// # Panics
///
/// Panics when the difference exceeds the tolerance.
#[track_caller]
pub fn assert_duration_near(actual: Duration, expected: Duration, tolerance: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= tolerance,
        "duration {actual:?} not within {tolerance:?} of {expected:?}"
    );
}
