//! Interactions: a machine plus the policy around raw events.
//!
//! An [`Interaction`] owns its machine and the interaction data. It adds
//! activation, event consumption and throttling on top of the machine, and
//! routes the signals of background threads through [`Interaction::pump`].

mod owner;
mod throttle;

pub use owner::{ChannelWaker, NoopWaker, OwnerWaker};

pub(crate) use owner::noop_waker;

use crate::fsm::{Fsm, FsmHandler, Machine, NoopHandler};
use std::sync::Arc;
use throttle::Throttle;
use tracing::{debug, trace};

type KindEq<E> = Box<dyn Fn(&E, &E) -> bool>;
type ConsumeHook<E> = Box<dyn FnMut(&E)>;

/// A machine wrapped with activation, consumption and throttling controls.
///
/// # Example
///
/// ```rust
/// use actuate::builder::{EventEdge, FsmBuilder};
/// use actuate::interaction::Interaction;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Pointer {
///     Down,
///     Move(i32),
///     Up,
/// }
///
/// type Edge = EventEdge<Pointer, Vec<i32>>;
///
/// let fsm = FsmBuilder::new()
///     .std_state("dragging")
///     .terminal_state("dropped")
///     .on("init", "dragging", Edge::on("down", |e| *e == Pointer::Down))
///     .on(
///         "dragging",
///         "dragging",
///         Edge::on("move", |e| matches!(e, Pointer::Move(_))).action(|e, path| {
///             if let Pointer::Move(x) = e {
///                 path.push(*x);
///             }
///         }),
///     )
///     .on("dragging", "dropped", Edge::on("up", |e| *e == Pointer::Up))
///     .build()
///     .unwrap();
///
/// let mut drag = Interaction::new(fsm);
/// drag.process_event(Pointer::Down);
/// drag.process_event(Pointer::Move(4));
/// assert!(drag.is_running());
/// assert_eq!(drag.data(), &vec![4]);
///
/// drag.set_activated(false);
/// assert!(!drag.process_event(Pointer::Down));
/// assert!(drag.data().is_empty());
/// ```
pub struct Interaction<E, D, M = Fsm<E, D>> {
    machine: M,
    data: D,
    activated: bool,
    consume_events: bool,
    on_consume: Option<ConsumeHook<E>>,
    throttle: Throttle<E>,
    kind_eq: KindEq<E>,
}

impl<E, D, M> Interaction<E, D, M>
where
    E: Clone + 'static,
    D: Default + 'static,
    M: Machine<E, D>,
{
    /// Wrap a machine. Events of the same enum variant count as the same
    /// kind for throttling.
    pub fn new(machine: M) -> Self {
        Self {
            machine,
            data: D::default(),
            activated: true,
            consume_events: false,
            on_consume: None,
            throttle: Throttle::new(noop_waker()),
            kind_eq: Box::new(|a, b| std::mem::discriminant(a) == std::mem::discriminant(b)),
        }
    }

    /// Replace the kind equality used by throttling.
    pub fn with_kind_eq<F>(mut self, kind_eq: F) -> Self
    where
        F: Fn(&E, &E) -> bool + 'static,
    {
        self.kind_eq = Box::new(kind_eq);
        self
    }

    /// Feed one raw event.
    ///
    /// Returns whether a transition fired for the events dispatched now. A
    /// throttled event is held back and yields `false`.
    pub fn process_event(&mut self, event: E) -> bool {
        self.process_event_with(event, &mut NoopHandler)
    }

    /// [`process_event`](Self::process_event) with a driver notified before
    /// the machine's own handlers.
    pub fn process_event_with(&mut self, event: E, driver: &mut dyn FsmHandler<D>) -> bool {
        if !self.activated {
            trace!("event ignored by deactivated interaction");
            return false;
        }

        let mut fired = false;
        for event in self.throttle.offer(event, &*self.kind_eq) {
            fired |= self.dispatch(event, driver);
        }
        fired
    }

    /// Apply the signals of background timers and throttle windows. Must be
    /// called on the owning thread, typically after an [`OwnerWaker`] fired.
    pub fn pump(&mut self) -> bool {
        self.pump_with(&mut NoopHandler)
    }

    pub fn pump_with(&mut self, driver: &mut dyn FsmHandler<D>) -> bool {
        if !self.activated {
            return false;
        }

        let mut fired = false;
        if let Some(event) = self.throttle.take_elapsed() {
            fired |= self.dispatch(event, driver);
        }
        fired |= self.machine.pump_with(&mut self.data, driver);
        fired
    }

    fn dispatch(&mut self, event: E, driver: &mut dyn FsmHandler<D>) -> bool {
        if self.consume_events {
            if let Some(hook) = &mut self.on_consume {
                hook(&event);
            }
        }
        self.machine.process_with(event, &mut self.data, driver)
    }

    /// Enable or disable the interaction. Disabling fully reinitialises the
    /// machine and resets the data.
    pub fn set_activated(&mut self, activated: bool) {
        if self.activated != activated {
            debug!(activated, "interaction activation changed");
        }
        self.activated = activated;
        if !activated {
            self.full_reinit();
        }
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Check if an interaction is in progress.
    pub fn is_running(&self) -> bool {
        self.activated && !self.machine.is_at_init()
    }

    /// Data gathered by the interaction so far.
    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    /// Event kinds the machine currently listens to.
    pub fn registered_kinds(&self) -> Vec<&'static str> {
        self.machine.accepted_kinds()
    }

    /// Abort the interaction in progress, dropping queued and throttled
    /// events.
    pub fn full_reinit(&mut self) {
        self.throttle.clear();
        self.machine.full_reinit(&mut self.data);
        self.data = D::default();
    }

    /// Minimum delay between two dispatched events of the same kind, in
    /// milliseconds. Zero disables throttling.
    pub fn set_throttle_timeout(&mut self, millis: u64) {
        self.throttle.set_timeout_ms(millis);
    }

    pub fn throttle_timeout(&self) -> u64 {
        self.throttle.timeout_ms()
    }

    /// Call the consumption hook for every dispatched event.
    pub fn set_consume_events(&mut self, consume: bool) {
        self.consume_events = consume;
    }

    pub fn consumes_events(&self) -> bool {
        self.consume_events
    }

    /// Hook marking an event as claimed, e.g. to stop its propagation in
    /// the toolkit.
    pub fn on_consume<F>(&mut self, hook: F)
    where
        F: FnMut(&E) + 'static,
    {
        self.on_consume = Some(Box::new(hook));
    }

    /// Hook used by timers and the throttle worker to reach the owning
    /// thread.
    pub fn set_owner_waker(&mut self, waker: Arc<dyn OwnerWaker>) {
        self.machine.set_owner_waker(waker.clone());
        self.throttle.set_waker(waker);
    }

    /// Deactivate, stop the throttle worker and release the machine.
    pub fn uninstall(&mut self) {
        self.activated = false;
        self.throttle.shutdown();
        self.machine.uninstall();
        self.on_consume = None;
        debug!("interaction uninstalled");
    }
}

impl<E, D: std::fmt::Debug, M: std::fmt::Debug> std::fmt::Debug for Interaction<E, D, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interaction")
            .field("machine", &self.machine)
            .field("data", &self.data)
            .field("activated", &self.activated)
            .field("consume_events", &self.consume_events)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}
