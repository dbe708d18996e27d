//! Lifecycle notifications emitted by running machines.

use thiserror::Error;
use uuid::Uuid;

/// Signal raised by a handler to abort the interaction in progress.
///
/// Returning `Err(CancelFsm)` from a start, update or stop notification
/// turns the transition being fired into a cancellation: the machine
/// notifies `on_cancel` and fully reinitialises. The signal never escapes
/// [`Machine::process`](crate::fsm::Machine::process).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("interaction cancelled by a handler")]
pub struct CancelFsm;

/// Observer of the start/update/stop/cancel lifecycle of a machine.
///
/// Every method receives the interaction data as it stands when the
/// notification fires. All methods default to no-ops.
///
/// # Example
///
/// ```rust
/// use actuate::fsm::{CancelFsm, FsmHandler};
///
/// #[derive(Default)]
/// struct Drag {
///     dx: i32,
/// }
///
/// struct RejectEmptyDrags;
///
/// impl FsmHandler<Drag> for RejectEmptyDrags {
///     fn on_stop(&mut self, data: &Drag) -> Result<(), CancelFsm> {
///         if data.dx == 0 {
///             return Err(CancelFsm);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait FsmHandler<D> {
    /// The machine reached its starting state.
    fn on_start(&mut self, _data: &D) -> Result<(), CancelFsm> {
        Ok(())
    }

    /// The started machine entered another standard state.
    fn on_update(&mut self, _data: &D) -> Result<(), CancelFsm> {
        Ok(())
    }

    /// The started machine reached a terminal state.
    fn on_stop(&mut self, _data: &D) -> Result<(), CancelFsm> {
        Ok(())
    }

    /// The started machine was cancelled.
    fn on_cancel(&mut self, _data: &D) {}
}

/// Handler that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl<D> FsmHandler<D> for NoopHandler {}

/// Identifies a handler registered on a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) Uuid);

impl HandlerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Lifecycle outcome recorded from a nested machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Started,
    Updated,
    Stopped,
    Cancelled,
}

/// Driver that records the notifications of a nested machine so its owner
/// can react once the nested call returned.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub(crate) outcomes: Vec<Outcome>,
}

impl<D> FsmHandler<D> for Recorder {
    fn on_start(&mut self, _data: &D) -> Result<(), CancelFsm> {
        self.outcomes.push(Outcome::Started);
        Ok(())
    }

    fn on_update(&mut self, _data: &D) -> Result<(), CancelFsm> {
        self.outcomes.push(Outcome::Updated);
        Ok(())
    }

    fn on_stop(&mut self, _data: &D) -> Result<(), CancelFsm> {
        self.outcomes.push(Outcome::Stopped);
        Ok(())
    }

    fn on_cancel(&mut self, _data: &D) {
        self.outcomes.push(Outcome::Cancelled);
    }
}
