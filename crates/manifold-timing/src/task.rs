//! Named worker threads with bounded joins.

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use manifold_errors::{RigError, RigResult};
use tracing::{debug, error};

/// Handle to a worker spawned with [`spawn_task`].
///
/// The worker holds the sending half of a channel that is dropped when it
/// returns (or unwinds), which lets [`TaskHandle::join_within`] wait with a
/// deadline.
pub struct TaskHandle<T> {
    name: String,
    done: Receiver<()>,
    handle: JoinHandle<T>,
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("finished", &self.handle.is_finished())
            .finish_non_exhaustive()
    }
}

/// Spawn a named worker thread.
///
/// # Errors
///
/// Returns [`RigError::TaskSpawn`] if the OS refuses to create the thread.
pub fn spawn_task<F, T>(name: impl Into<String>, f: F) -> RigResult<TaskHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let name = name.into();
    let (done_tx, done_rx) = channel::bounded::<()>(0);

    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let _done = done_tx;
            f()
        })
        .map_err(|e| RigError::task_spawn(name.clone(), e.to_string()))?;

    debug!(task = %name, "Task spawned");
    Ok(TaskHandle {
        name,
        done: done_rx,
        handle,
    })
}

impl<T> TaskHandle<T> {
    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the worker has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Returns true when called from the worker thread itself.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.handle.thread().id() == thread::current().id()
    }

    /// Wait up to `bound` for the worker to finish and return its output.
    ///
    /// # Errors
    ///
    /// - [`RigError::ShutdownTimeout`] if the worker is still running after
    ///   `bound`. The thread is detached.
    /// - [`RigError::TaskPanicked`] if the worker panicked.
    pub fn join_within(self, bound: Duration) -> RigResult<T> {
        match self.done.recv_timeout(bound) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                error!(
                    task = %self.name,
                    waited_ms = bound.as_millis(),
                    "Task did not observe cancellation in time"
                );
                return Err(RigError::shutdown_timeout(self.name, bound));
            }
        }

        match self.handle.join() {
            Ok(value) => {
                debug!(task = %self.name, "Task joined");
                Ok(value)
            }
            Err(_) => {
                error!(task = %self.name, "Task panicked");
                Err(RigError::task_panicked(self.name))
            }
        }
    }
}
