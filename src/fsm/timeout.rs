//! Background timer behind timeout transitions.
//!
//! Each armed timeout owns one sleeping thread. The thread waits on a cancel
//! channel: dropping the sender disarms it. When the delay elapses the thread
//! posts its generation into the machine's mailbox and wakes the owner. Only
//! a signal carrying the generation still armed is honoured by
//! [`TimeoutTimer::take_due`], so a disarmed timer can never fire.

use crate::interaction::OwnerWaker;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Result of arming a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Armed {
    /// A background thread now waits for the delay.
    Scheduled,
    /// The delay was zero: the caller must fire the transition right away.
    Immediate,
    /// The thread could not be spawned.
    Failed,
}

struct Pending {
    transition: usize,
    generation: u64,
    // Dropping the sender wakes the sleeping thread with a disconnect.
    _cancel: Sender<()>,
}

pub(crate) struct TimeoutTimer {
    generation: u64,
    pending: Option<Pending>,
    signals_tx: Sender<u64>,
    signals_rx: Receiver<u64>,
    waker: Arc<dyn OwnerWaker>,
}

impl TimeoutTimer {
    pub(crate) fn new(waker: Arc<dyn OwnerWaker>) -> Self {
        let (signals_tx, signals_rx) = crossbeam_channel::unbounded();
        Self {
            generation: 0,
            pending: None,
            signals_tx,
            signals_rx,
            waker,
        }
    }

    pub(crate) fn set_waker(&mut self, waker: Arc<dyn OwnerWaker>) {
        self.waker = waker;
    }

    /// Arm `transition` for `millis`, disarming any previous timeout.
    pub(crate) fn arm(&mut self, transition: usize, millis: u64) -> Armed {
        self.disarm();
        if millis == 0 {
            return Armed::Immediate;
        }

        self.generation += 1;
        let generation = self.generation;
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(0);
        let signals = self.signals_tx.clone();
        let waker = self.waker.clone();
        let delay = Duration::from_millis(millis);

        let spawned = std::thread::Builder::new()
            .name(format!("actuate-timeout-{generation}"))
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(delay) {
                    if signals.send(generation).is_ok() {
                        waker.wake();
                    }
                }
            });

        match spawned {
            Ok(_) => {
                debug!(transition, generation, millis, "timeout armed");
                self.pending = Some(Pending {
                    transition,
                    generation,
                    _cancel: cancel_tx,
                });
                Armed::Scheduled
            }
            Err(err) => {
                error!(error = %err, "cannot spawn timeout thread");
                Armed::Failed
            }
        }
    }

    /// Stop the armed timeout, if any. Idempotent.
    pub(crate) fn disarm(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(generation = pending.generation, "timeout disarmed");
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Drain the mailbox and return the transition whose delay elapsed.
    pub(crate) fn take_due(&mut self) -> Option<usize> {
        let mut due = None;
        for generation in self.signals_rx.try_iter() {
            match &self.pending {
                Some(pending) if pending.generation == generation => {
                    due = Some(pending.transition);
                }
                _ => trace!(generation, "stale timeout signal dropped"),
            }
        }
        if due.is_some() {
            self.pending = None;
        }
        due
    }
}

impl std::fmt::Debug for TimeoutTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutTimer")
            .field("generation", &self.generation)
            .field("armed", &self.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::ChannelWaker;

    fn timer() -> (TimeoutTimer, Receiver<()>) {
        let (waker, rx) = ChannelWaker::new();
        (TimeoutTimer::new(Arc::new(waker)), rx)
    }

    #[test]
    fn zero_delay_fires_immediately() {
        let (mut timer, _wakeups) = timer();
        assert_eq!(timer.arm(3, 0), Armed::Immediate);
        assert!(!timer.is_armed());
    }

    #[test]
    fn elapsed_timeout_becomes_due() {
        let (mut timer, wakeups) = timer();
        assert_eq!(timer.arm(7, 10), Armed::Scheduled);

        wakeups.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(timer.take_due(), Some(7));
        assert!(!timer.is_armed());
        assert_eq!(timer.take_due(), None);
    }

    #[test]
    fn disarmed_timeout_never_fires() {
        let (mut timer, wakeups) = timer();
        timer.arm(1, 20);
        timer.disarm();

        assert!(wakeups.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(timer.take_due(), None);
    }

    #[test]
    fn rearming_ignores_stale_signal() {
        let (mut timer, wakeups) = timer();
        timer.arm(1, 5);
        wakeups.recv_timeout(Duration::from_secs(2)).unwrap();

        // The first signal is queued but a new timeout replaced it
        timer.arm(2, 10_000);
        assert_eq!(timer.take_due(), None);
        assert!(timer.is_armed());
    }
}
