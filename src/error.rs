//! Runtime error reporting.
//!
//! Failures that happen while an interaction runs never unwind through the
//! state machine. They are converted into a [`ReportedError`] and handed to an
//! [`ErrorCatcher`], which logs them and broadcasts them to every subscriber.
//! Construction problems are reported separately, as
//! [`ConfigError`](crate::builder::ConfigError).

use crate::channel::Publisher;
use crossbeam_channel::Receiver;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{error, warn};

/// Failure of a command body or of a command producer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("command producer failed: {0}")]
    Producer(String),

    #[error("execution failed: {0}")]
    Execution(String),

    /// Returned by [`Undoable::undo`](crate::command::Undoable::undo)
    /// implementations.
    #[error("undo failed: {0}")]
    Undo(String),

    /// Returned by [`Undoable::redo`](crate::command::Undoable::redo)
    /// implementations.
    #[error("redo failed: {0}")]
    Redo(String),

    #[error("command `{0}` does not support undo")]
    NotUndoable(String),
}

/// Error published on the shared error channel.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReportedError {
    #[error("no command produced: {source}")]
    ProducerFailed { source: CommandError },

    #[error("command `{command}` could not execute: {source}")]
    ExecutionFailed {
        command: String,
        source: CommandError,
    },

    #[error("command `{command}` could not be undone: {source}")]
    UndoFailed {
        command: String,
        source: CommandError,
    },

    #[error("continuous binding cancelled `{command}` after it took effect, but it is not undoable")]
    MustBeUndoable { command: String },
}

impl ReportedError {
    /// Check if the error denotes a misconfigured binding rather than a
    /// recoverable runtime failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MustBeUndoable { .. })
    }
}

/// Error returned synchronously by a binding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BindingError {
    #[error("continuous binding cancelled `{command}` after it took effect, but it is not undoable")]
    MustBeUndoable { command: String },
}

impl From<BindingError> for ReportedError {
    fn from(err: BindingError) -> Self {
        match err {
            BindingError::MustBeUndoable { command } => ReportedError::MustBeUndoable { command },
        }
    }
}

/// Shared error channel.
///
/// # Example
///
/// ```rust
/// use actuate::error::{CommandError, ErrorCatcher, ReportedError};
///
/// let errors = ErrorCatcher::new();
/// let rx = errors.subscribe();
///
/// errors.report(ReportedError::ProducerFailed {
///     source: CommandError::Producer("no selection".into()),
/// });
///
/// assert!(!rx.try_recv().unwrap().is_fatal());
/// ```
#[derive(Debug, Default)]
pub struct ErrorCatcher {
    publisher: Publisher<ReportedError>,
}

impl ErrorCatcher {
    /// Create a private catcher with no subscribers.
    pub fn new() -> Self {
        Self {
            publisher: Publisher::new(),
        }
    }

    /// Process-wide default catcher.
    pub fn global() -> Arc<ErrorCatcher> {
        static GLOBAL: OnceLock<Arc<ErrorCatcher>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ErrorCatcher::new())).clone()
    }

    /// Log an error and broadcast it to every subscriber.
    pub fn report(&self, err: ReportedError) {
        if err.is_fatal() {
            error!(error = %err, "binding misconfiguration");
        } else {
            warn!(error = %err, "interaction error caught");
        }
        self.publisher.publish(err);
    }

    /// Receive every error reported from now on.
    pub fn subscribe(&self) -> Receiver<ReportedError> {
        self.publisher.subscribe()
    }
}
