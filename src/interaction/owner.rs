//! Hooks that hand background work back to the owning thread.
//!
//! Timeout timers and the throttle worker never touch a machine directly.
//! They post a signal into the owner's mailbox and call [`OwnerWaker::wake`]
//! so the event loop knows it should call `pump` on the owning thread.

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;

/// "Run in owning thread" hook.
///
/// Implementations must be cheap and must not block: `wake` is called from
/// timer and worker threads.
pub trait OwnerWaker: Send + Sync {
    /// Ask the owning thread to pump pending signals.
    fn wake(&self);
}

/// Waker for owners that poll on their own schedule.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWaker;

impl OwnerWaker for NoopWaker {
    fn wake(&self) {}
}

/// Waker that posts a unit message on a channel.
///
/// Event loops built on `crossbeam-channel` can `select!` on the receiver
/// next to their input sources.
///
/// # Example
///
/// ```rust
/// use actuate::interaction::{ChannelWaker, OwnerWaker};
///
/// let (waker, wakeups) = ChannelWaker::new();
/// waker.wake();
/// assert!(wakeups.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ChannelWaker {
    tx: Sender<()>,
}

impl ChannelWaker {
    /// Create a waker and the receiver it signals.
    pub fn new() -> (Self, Receiver<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl OwnerWaker for ChannelWaker {
    fn wake(&self) {
        // Owner gone: nothing left to wake.
        let _ = self.tx.send(());
    }
}

pub(crate) fn noop_waker() -> Arc<dyn OwnerWaker> {
    Arc::new(NoopWaker)
}
