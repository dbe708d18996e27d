//! Interaction state machine engine.
//!
//! This module runs the graphs described with [`crate::builder`]:
//! - [`Fsm`]: a single machine with timeout transitions, sub-machines and
//!   event recycling
//! - [`ConcurrentFsm`]: several machines fed the same events, seen as one
//! - [`FsmHandler`]: observer of the start/update/stop/cancel lifecycle
//!
//! Machines are single-threaded. Timeouts run on background threads that
//! only post signals; the owner applies them by calling [`Machine::pump`].

mod concurrent;
mod handler;
mod machine;
mod timeout;
pub(crate) mod transition;

pub use concurrent::ConcurrentFsm;
pub use handler::{CancelFsm, FsmHandler, HandlerId, NoopHandler};
pub use machine::Fsm;

use crate::interaction::OwnerWaker;
use std::sync::Arc;

/// Operations shared by every machine an interaction can drive.
///
/// `D` is the interaction data. It is owned by the caller and lent to the
/// machine for every call, so transition actions can fill it in and
/// handlers can read it.
pub trait Machine<E, D> {
    /// Process one event, notifying `driver` before the registered handlers.
    ///
    /// Returns whether a transition fired. A transition turned into a
    /// cancellation by a handler still counts as fired.
    fn process_with(&mut self, event: E, data: &mut D, driver: &mut dyn FsmHandler<D>) -> bool;

    /// Process one event, notifying only the registered handlers.
    fn process(&mut self, event: E, data: &mut D) -> bool {
        self.process_with(event, data, &mut NoopHandler)
    }

    /// Apply the signals posted by background timers.
    ///
    /// Returns whether a timeout transition fired.
    fn pump_with(&mut self, data: &mut D, driver: &mut dyn FsmHandler<D>) -> bool;

    /// [`pump_with`](Self::pump_with) without a driver.
    fn pump(&mut self, data: &mut D) -> bool {
        self.pump_with(data, &mut NoopHandler)
    }

    /// Go back to init, keeping the events queued for replay.
    fn reinit(&mut self, data: &mut D);

    /// Go back to init and drop the events queued for replay.
    fn full_reinit(&mut self, data: &mut D);

    /// Release states, transitions, timers and channels. The machine must
    /// not be used afterwards: processing always returns `false`.
    fn uninstall(&mut self);

    /// Check if the current run reached its starting state.
    fn is_started(&self) -> bool;

    /// Check if the machine sits in its init state.
    fn is_at_init(&self) -> bool;

    /// Name of the current state, looking through running sub-machines.
    fn current_state_name(&self) -> &str;

    /// Event kinds the current state reacts to.
    fn accepted_kinds(&self) -> Vec<&'static str>;

    /// Hook used by timers to hand work back to the owning thread.
    fn set_owner_waker(&mut self, waker: Arc<dyn OwnerWaker>);

    /// Mark the machine as embedded in another one. Inner machines never
    /// reset the interaction data.
    fn set_inner(&mut self, inner: bool);

    fn is_inner(&self) -> bool;

    /// Register a lifecycle observer.
    fn add_handler(&mut self, handler: Box<dyn FsmHandler<D>>) -> HandlerId;

    /// Unregister a lifecycle observer, returning whether it was present.
    fn remove_handler(&mut self, id: HandlerId) -> bool;
}
