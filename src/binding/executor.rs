//! Asynchronous command execution.

use tracing::error;

/// Work item running one command off the owning thread.
pub type Job = Box<dyn FnOnce() + Send>;

/// Extension point deciding where asynchronous commands run.
///
/// The job executes the command and posts the result back to the binding,
/// which finishes the command on its next [`pump`](crate::binding::Binding::pump).
///
/// # Example
///
/// ```rust
/// use actuate::binding::{CommandExecutor, Job};
///
/// /// Runs every job on the calling thread.
/// struct Inline;
///
/// impl CommandExecutor for Inline {
///     fn execute(&self, job: Job) {
///         job();
///     }
/// }
/// ```
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Executor spawning one thread per command.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl CommandExecutor for ThreadExecutor {
    fn execute(&self, job: Job) {
        let spawned = std::thread::Builder::new()
            .name("actuate-command".to_string())
            .spawn(job);
        if let Err(err) = spawned {
            error!(error = %err, "cannot spawn command thread, command dropped");
        }
    }
}
