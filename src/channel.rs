//! In-process broadcast channels.
//!
//! A [`Publisher`] fans every published value out to all live subscribers.
//! Each subscriber gets its own unbounded `crossbeam-channel` receiver, so a
//! slow or absent reader never blocks the publishing thread. Subscribers that
//! dropped their receiver are pruned on the next publish.

use crossbeam_channel::{Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Multi-subscriber broadcast channel.
///
/// # Example
///
/// ```rust
/// use actuate::channel::Publisher;
///
/// let publisher = Publisher::new();
/// let first = publisher.subscribe();
/// let second = publisher.subscribe();
///
/// assert_eq!(publisher.publish("pressed"), 2);
/// assert_eq!(first.try_recv(), Ok("pressed"));
/// assert_eq!(second.try_recv(), Ok("pressed"));
/// ```
pub struct Publisher<T> {
    subscribers: Mutex<Subscribers<T>>,
}

struct Subscribers<T> {
    senders: Vec<Sender<T>>,
    closed: bool,
}

impl<T: Clone> Publisher<T> {
    /// Create a publisher with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Subscribers {
                senders: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Register a new subscriber.
    ///
    /// The receiver only sees values published after this call. Subscribing
    /// to a closed publisher yields an already disconnected receiver.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut subscribers = lock(&self.subscribers);
        if !subscribers.closed {
            subscribers.senders.push(tx);
        }
        rx
    }

    /// Send a value to every live subscriber, returning how many received it.
    pub fn publish(&self, value: T) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers
            .senders
            .retain(|sender| sender.send(value.clone()).is_ok());
        subscribers.senders.len()
    }

    /// Disconnect every subscriber and refuse new ones.
    pub fn close(&self) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.closed = true;
        subscribers.senders.clear();
    }

    /// Check if [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        lock(&self.subscribers).closed
    }

    /// Number of subscribers still registered.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).senders.len()
    }
}

impl<T: Clone> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers = lock(&self.subscribers);
        f.debug_struct("Publisher")
            .field("subscribers", &subscribers.senders.len())
            .field("closed", &subscribers.closed)
            .finish()
    }
}
