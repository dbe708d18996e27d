//! Coalescing of high-frequency events.
//!
//! Decisions are taken on the owning thread. A worker thread, spawned on
//! first use, only measures throttle windows: when a window elapses it posts
//! the window generation and wakes the owner, which flushes the buffered
//! event on its next pump.

use crate::interaction::OwnerWaker;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

enum WorkerCommand {
    Schedule { generation: u64, delay: Duration },
    SetWaker(Arc<dyn OwnerWaker>),
    Shutdown,
}

struct Worker {
    commands: Sender<WorkerCommand>,
    done: Receiver<()>,
}

pub(crate) struct Throttle<E> {
    timeout_ms: u64,
    current: Option<E>,
    pending: bool,
    generation: u64,
    signals_tx: Sender<u64>,
    signals_rx: Receiver<u64>,
    worker: Option<Worker>,
    waker: Arc<dyn OwnerWaker>,
}

impl<E: Clone> Throttle<E> {
    pub(crate) fn new(waker: Arc<dyn OwnerWaker>) -> Self {
        let (signals_tx, signals_rx) = crossbeam_channel::unbounded();
        Self {
            timeout_ms: 0,
            current: None,
            pending: false,
            generation: 0,
            signals_tx,
            signals_rx,
            worker: None,
            waker,
        }
    }

    pub(crate) fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Change the window. Zero disables throttling and drops the buffer.
    pub(crate) fn set_timeout_ms(&mut self, millis: u64) {
        self.timeout_ms = millis;
        if millis == 0 {
            self.clear();
        }
    }

    pub(crate) fn set_waker(&mut self, waker: Arc<dyn OwnerWaker>) {
        if let Some(worker) = &self.worker {
            // A dead worker is respawned with the new waker on next schedule.
            if worker.commands.send(WorkerCommand::SetWaker(waker.clone())).is_err() {
                self.worker = None;
            }
        }
        self.waker = waker;
    }

    /// Check if an event is held back, waiting for its window to elapse.
    pub(crate) fn has_pending(&self) -> bool {
        self.pending
    }

    /// Offer an incoming event. Returns the events to dispatch now, in order.
    pub(crate) fn offer(&mut self, event: E, same_kind: &dyn Fn(&E, &E) -> bool) -> Vec<E> {
        if self.timeout_ms == 0 {
            return vec![event];
        }

        match self.current.take() {
            Some(current) if same_kind(&current, &event) => {
                trace!(generation = self.generation, "throttled event coalesced");
                self.current = Some(event);
                self.pending = true;
                Vec::new()
            }
            previous => {
                let mut out = Vec::with_capacity(2);
                if let Some(previous) = previous.filter(|_| self.pending) {
                    trace!("kind changed, flushing throttled event");
                    out.push(previous);
                }
                self.current = Some(event.clone());
                self.pending = false;
                self.schedule();
                out.push(event);
                out
            }
        }
    }

    /// Drain window signals and return the event to flush, if its window
    /// elapsed.
    pub(crate) fn take_elapsed(&mut self) -> Option<E> {
        let generation = self.generation;
        let elapsed = self.signals_rx.try_iter().filter(|g| *g == generation).count() > 0;
        if !elapsed {
            return None;
        }

        trace!(generation, "throttle window elapsed");
        let current = self.current.take();
        let pending = std::mem::replace(&mut self.pending, false);
        current.filter(|_| pending)
    }

    /// Drop the buffered event and invalidate the running window.
    pub(crate) fn clear(&mut self) {
        self.current = None;
        self.pending = false;
        self.generation += 1;
        self.signals_rx.try_iter().for_each(drop);
    }

    fn schedule(&mut self) {
        self.generation += 1;
        let command = WorkerCommand::Schedule {
            generation: self.generation,
            delay: Duration::from_millis(self.timeout_ms),
        };

        let Some(worker) = self.worker_handle() else {
            return;
        };
        if let Err(err) = worker.commands.send(command) {
            // The worker exited; retry once on a fresh one.
            self.worker = None;
            if let Some(worker) = self.worker_handle() {
                let _ = worker.commands.send(err.into_inner());
            }
        }
    }

    fn worker_handle(&mut self) -> Option<&Worker> {
        if self.worker.is_none() {
            self.worker = self.spawn_worker();
        }
        self.worker.as_ref()
    }

    fn spawn_worker(&self) -> Option<Worker> {
        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let signals = self.signals_tx.clone();
        let waker = self.waker.clone();

        let spawned = std::thread::Builder::new()
            .name("actuate-throttle".to_string())
            .spawn(move || {
                run_worker(commands_rx, signals, waker);
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(_) => {
                debug!("throttle worker started");
                Some(Worker {
                    commands: commands_tx,
                    done: done_rx,
                })
            }
            Err(err) => {
                error!(error = %err, "cannot spawn throttle worker, throttling disabled");
                None
            }
        }
    }

    /// Stop the worker and wait a bounded time for it to exit.
    pub(crate) fn shutdown(&mut self) {
        self.clear();
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.commands.send(WorkerCommand::Shutdown).is_err() {
            return;
        }
        match worker.done.recv_timeout(SHUTDOWN_GRACE) {
            Ok(()) => debug!("throttle worker stopped"),
            Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => warn!("throttle worker did not stop in time"),
        }
    }
}

impl<E> Drop for Throttle<E> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.commands.send(WorkerCommand::Shutdown);
        }
    }
}

fn run_worker(commands: Receiver<WorkerCommand>, signals: Sender<u64>, mut waker: Arc<dyn OwnerWaker>) {
    let mut scheduled: Option<(u64, Instant)> = None;
    loop {
        let received = match scheduled {
            Some((_, deadline)) => commands.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(WorkerCommand::Schedule { generation, delay }) => {
                scheduled = Some((generation, Instant::now() + delay));
            }
            Ok(WorkerCommand::SetWaker(new_waker)) => waker = new_waker,
            Ok(WorkerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if let Some((generation, _)) = scheduled.take() {
                    if signals.send(generation).is_err() {
                        break;
                    }
                    waker.wake();
                }
            }
        }
    }
}

impl<E> std::fmt::Debug for Throttle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("timeout_ms", &self.timeout_ms)
            .field("pending", &self.pending)
            .field("generation", &self.generation)
            .field("worker", &self.worker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{noop_waker, ChannelWaker};

    #[derive(Clone, Debug, PartialEq)]
    enum Ev {
        Move(i32),
        Click,
    }

    fn same_kind(a: &Ev, b: &Ev) -> bool {
        std::mem::discriminant(a) == std::mem::discriminant(b)
    }

    #[test]
    fn disabled_throttle_passes_everything() {
        let mut throttle = Throttle::new(noop_waker());

        assert_eq!(throttle.offer(Ev::Move(1), &same_kind), vec![Ev::Move(1)]);
        assert_eq!(throttle.offer(Ev::Move(2), &same_kind), vec![Ev::Move(2)]);
        assert!(throttle.worker.is_none());
    }

    #[test]
    fn burst_keeps_only_latest_until_kind_changes() {
        let mut throttle = Throttle::new(noop_waker());
        throttle.set_timeout_ms(10_000);

        assert_eq!(throttle.offer(Ev::Move(1), &same_kind), vec![Ev::Move(1)]);
        assert!(throttle.offer(Ev::Move(2), &same_kind).is_empty());
        assert!(throttle.offer(Ev::Move(3), &same_kind).is_empty());
        assert!(throttle.has_pending());

        assert_eq!(throttle.offer(Ev::Click, &same_kind), vec![Ev::Move(3), Ev::Click]);
        assert!(!throttle.has_pending());
        throttle.shutdown();
    }

    #[test]
    fn kind_change_without_pending_event_dispatches_only_new_one() {
        let mut throttle = Throttle::new(noop_waker());
        throttle.set_timeout_ms(10_000);

        throttle.offer(Ev::Move(1), &same_kind);
        assert_eq!(throttle.offer(Ev::Click, &same_kind), vec![Ev::Click]);
        throttle.shutdown();
    }

    #[test]
    fn elapsed_window_flushes_latest_event() {
        let (waker, wakeups) = ChannelWaker::new();
        let mut throttle = Throttle::new(Arc::new(waker));
        throttle.set_timeout_ms(20);

        throttle.offer(Ev::Move(1), &same_kind);
        throttle.offer(Ev::Move(2), &same_kind);
        assert!(wakeups.recv_timeout(Duration::from_secs(2)).is_ok());

        assert_eq!(throttle.take_elapsed(), Some(Ev::Move(2)));
        assert_eq!(throttle.take_elapsed(), None);

        // A new burst after the flush is dispatched right away.
        assert_eq!(throttle.offer(Ev::Move(5), &same_kind), vec![Ev::Move(5)]);
        throttle.shutdown();
    }

    #[test]
    fn elapsed_window_without_pending_event_flushes_nothing() {
        let (waker, wakeups) = ChannelWaker::new();
        let mut throttle = Throttle::new(Arc::new(waker));
        throttle.set_timeout_ms(10);

        throttle.offer(Ev::Click, &same_kind);
        assert!(wakeups.recv_timeout(Duration::from_secs(2)).is_ok());

        assert_eq!(throttle.take_elapsed(), None);
        assert_eq!(throttle.offer(Ev::Click, &same_kind), vec![Ev::Click]);
        throttle.shutdown();
    }

    #[test]
    fn cleared_window_never_flushes() {
        let (waker, wakeups) = ChannelWaker::new();
        let mut throttle = Throttle::new(Arc::new(waker));
        throttle.set_timeout_ms(10);

        throttle.offer(Ev::Move(1), &same_kind);
        throttle.offer(Ev::Move(2), &same_kind);
        throttle.clear();
        let _ = wakeups.recv_timeout(Duration::from_millis(200));

        assert_eq!(throttle.take_elapsed(), None);
        throttle.shutdown();
    }

    #[test]
    fn shutdown_stops_worker() {
        let mut throttle = Throttle::new(noop_waker());
        throttle.set_timeout_ms(50);
        throttle.offer(Ev::Click, &same_kind);
        assert!(throttle.worker.is_some());

        throttle.shutdown();
        assert!(throttle.worker.is_none());
        throttle.shutdown();
    }
}
