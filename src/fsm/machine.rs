//! The finite state machine engine.

use crate::builder::FsmBuilder;
use crate::channel::Publisher;
use crate::core::{StateChange, StateHistory, StateId, StateKind, StateNode};
use crate::fsm::handler::{CancelFsm, FsmHandler, HandlerId, Outcome, Recorder};
use crate::fsm::timeout::{Armed, TimeoutTimer};
use crate::fsm::transition::{Edge, Transition};
use crate::fsm::Machine;
use crate::interaction::{noop_waker, OwnerWaker};
use crossbeam_channel::Receiver;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Arena index of the init state.
pub(crate) const INIT: usize = 0;

/// Finite state machine recognising one kind of multi-event interaction.
///
/// States and transitions live in vectors owned by the machine and refer
/// to each other by index. Events are tried against the outgoing
/// transitions of the current state in registration order; the first one
/// whose `accept` and guard both hold fires.
///
/// Machines are built with [`FsmBuilder`] and driven through the
/// [`Machine`] trait.
///
/// # Example
///
/// ```rust
/// use actuate::builder::{EventEdge, FsmBuilder};
/// use actuate::fsm::Machine;
///
/// #[derive(Clone, Debug)]
/// enum Mouse {
///     Press,
///     Release,
/// }
///
/// type Edge = EventEdge<Mouse, ()>;
///
/// let mut fsm = FsmBuilder::new()
///     .std_state("pressed")
///     .terminal_state("released")
///     .on("init", "pressed", Edge::on("press", |e| matches!(e, Mouse::Press)))
///     .on("pressed", "released", Edge::on("release", |e| matches!(e, Mouse::Release)))
///     .build()
///     .unwrap();
///
/// let mut data = ();
/// assert!(fsm.process(Mouse::Press, &mut data));
/// assert_eq!(fsm.current_state_name(), "pressed");
/// assert!(fsm.process(Mouse::Release, &mut data));
/// assert_eq!(fsm.current_state_name(), "init");
/// ```
pub struct Fsm<E, D> {
    id: Uuid,
    states: Vec<StateNode>,
    transitions: Vec<Transition<E, D>>,
    current: usize,
    starting: Option<usize>,
    started: bool,
    inner: bool,
    queue: VecDeque<E>,
    active_sub: Option<usize>,
    handlers: Vec<(HandlerId, Box<dyn FsmHandler<D>>)>,
    timer: TimeoutTimer,
    changes: Publisher<StateChange>,
    history: Option<StateHistory>,
    uninstalled: bool,
}

impl<E: Clone + 'static, D: Default + 'static> Fsm<E, D> {
    pub(crate) fn from_parts(
        id: Uuid,
        states: Vec<StateNode>,
        transitions: Vec<Transition<E, D>>,
        starting: Option<usize>,
    ) -> Self {
        Self {
            id,
            states,
            transitions,
            current: INIT,
            starting,
            started: false,
            inner: false,
            queue: VecDeque::new(),
            active_sub: None,
            handlers: Vec::new(),
            timer: TimeoutTimer::new(noop_waker()),
            changes: Publisher::new(),
            history: None,
            uninstalled: false,
        }
    }

    /// Start describing a new machine.
    pub fn builder() -> FsmBuilder<E, D> {
        FsmBuilder::new()
    }

    /// Unique id of this machine.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle of the current state of this machine (not of a running
    /// sub-machine).
    pub fn current_state(&self) -> StateId {
        StateId::new(self.id, self.current)
    }

    /// Look a state up by name.
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .map(|index| StateId::new(self.id, index))
    }

    /// Name of a state of this machine.
    pub fn state_name(&self, state: StateId) -> Option<&str> {
        self.node(state).map(|s| s.name.as_str())
    }

    /// Kind of a state of this machine.
    pub fn state_kind(&self, state: StateId) -> Option<StateKind> {
        self.node(state).map(|s| s.kind)
    }

    /// Configured starting state. `None` means the machine starts as soon as
    /// it leaves its init state.
    pub fn starting_state(&self) -> Option<StateId> {
        self.starting.map(|index| StateId::new(self.id, index))
    }

    /// Receive every move of the current-state cursor from now on.
    ///
    /// While a sub-machine runs, its moves are republished here.
    pub fn subscribe_state_changes(&self) -> Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Keep the last `capacity` state changes in memory.
    pub fn record_history(&mut self, capacity: usize) {
        self.history = Some(StateHistory::with_capacity(capacity));
    }

    /// Trail recorded since [`record_history`](Self::record_history).
    pub fn history(&self) -> Option<&StateHistory> {
        self.history.as_ref()
    }

    /// Queue an event for replay once the current run terminates.
    pub fn add_remaining_event(&mut self, event: E) {
        self.queue.push_back(event);
    }

    /// Events waiting for replay.
    pub fn events_to_process(&self) -> Vec<E> {
        self.queue.iter().cloned().collect()
    }

    /// Check if a timeout transition is waiting for its delay.
    pub fn has_armed_timeout(&self) -> bool {
        self.timer.is_armed()
    }

    /// Check if a sub-machine currently receives the events.
    pub fn in_sub_machine(&self) -> bool {
        self.active_sub.is_some()
    }

    /// Check if [`uninstall`](Machine::uninstall) was called.
    pub fn is_uninstalled(&self) -> bool {
        self.uninstalled
    }

    fn node(&self, state: StateId) -> Option<&StateNode> {
        if state.machine != self.id {
            return None;
        }
        self.states.get(state.index)
    }

    fn state_label(&self, index: usize) -> &str {
        self.states.get(index).map_or("", |s| s.name.as_str())
    }

    pub(crate) fn accepts_from_init(&self, event: &E, data: &D) -> bool {
        self.states.get(INIT).map_or(false, |init| {
            init.transitions
                .iter()
                .any(|&t| self.transitions[t].accepts(event, data))
        })
    }

    pub(crate) fn kinds_from_init(&self) -> Vec<&'static str> {
        self.kinds_from(INIT)
    }

    fn kinds_from(&self, state: usize) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        let Some(node) = self.states.get(state) else {
            return kinds;
        };
        for &t in &node.transitions {
            for kind in self.transitions[t].accepted_kinds() {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }

    fn dispatch(&mut self, event: E, data: &mut D, driver: &mut dyn FsmHandler<D>) -> bool {
        if self.uninstalled {
            return false;
        }
        if let Some(t) = self.active_sub {
            return self.forward_to_sub(t, event, data, driver);
        }

        let fired = self.states[self.current]
            .transitions
            .iter()
            .copied()
            .find(|&t| self.transitions[t].accepts(&event, data));

        let Some(t) = fired else {
            trace!(fsm = %self.id, state = %self.state_label(self.current), "event ignored");
            return false;
        };

        if matches!(self.transitions[t].edge, Edge::Sub(_)) {
            self.enter_sub(t, event, data, driver);
        } else {
            self.fire_event(t, event, data, driver);
        }
        true
    }

    fn fire_event(&mut self, t: usize, event: E, data: &mut D, driver: &mut dyn FsmHandler<D>) {
        self.timer.disarm();
        let transition = &self.transitions[t];
        trace!(
            fsm = %self.id,
            from = %self.state_label(transition.source),
            to = %self.state_label(transition.target),
            "transition fired"
        );
        if let Edge::Event(edge) = &transition.edge {
            if edge.recycle {
                debug!(fsm = %self.id, "event queued for recycling");
                self.queue.push_back(event.clone());
            }
            if let Some(action) = &edge.action {
                action(&event, data);
            }
        }
        let target = transition.target;
        self.enter(target, data, driver);
    }

    fn fire_timeout(&mut self, t: usize, data: &mut D, driver: &mut dyn FsmHandler<D>) {
        self.timer.disarm();
        debug!(fsm = %self.id, state = %self.state_label(self.current), "timeout fired");
        if let Edge::Timeout(edge) = &self.transitions[t].edge {
            if let Some(action) = &edge.action {
                action(data);
            }
        }
        let target = self.transitions[t].target;
        self.enter(target, data, driver);
    }

    /// Enter `target`, turning a cancellation requested by a handler into
    /// the cancelling path.
    fn enter(&mut self, target: usize, data: &mut D, driver: &mut dyn FsmHandler<D>) {
        let entered = match self.states[target].kind {
            StateKind::Standard => self.enter_standard(target, data, driver),
            StateKind::Terminal => self.enter_terminal(target, data, driver),
            // Entering a cancelling state is itself a cancellation
            StateKind::Cancelling => self
                .check_starting(Some(target), data, driver)
                .and(Err(CancelFsm)),
            StateKind::Init => {
                self.reinit(data);
                Ok(())
            }
        };
        if entered.is_err() {
            self.on_cancelling(data, driver);
        }
    }

    fn enter_standard(
        &mut self,
        target: usize,
        data: &mut D,
        driver: &mut dyn FsmHandler<D>,
    ) -> Result<(), CancelFsm> {
        self.check_starting(Some(target), data, driver)?;
        self.set_current(target);
        if self.started {
            self.notify_update(data, driver)?;
        }
        self.arm_timeout(data, driver);
        Ok(())
    }

    fn enter_terminal(
        &mut self,
        target: usize,
        data: &mut D,
        driver: &mut dyn FsmHandler<D>,
    ) -> Result<(), CancelFsm> {
        self.check_starting(Some(target), data, driver)?;
        if self.started {
            debug!(fsm = %self.id, state = %self.state_label(target), "machine stopped");
            self.notify_stop(data, driver)?;
        }
        self.reinit(data);
        self.replay(data, driver);
        Ok(())
    }

    /// Start the machine if `entering` is its starting state, or if it is
    /// leaving init and no starting state was configured.
    fn check_starting(
        &mut self,
        entering: Option<usize>,
        data: &D,
        driver: &mut dyn FsmHandler<D>,
    ) -> Result<(), CancelFsm> {
        if self.started {
            return Ok(());
        }
        let reached = match (self.starting, entering) {
            (None, _) => self.current == INIT,
            (Some(starting), Some(target)) => starting == target,
            (Some(_), None) => false,
        };
        if reached {
            self.started = true;
            debug!(fsm = %self.id, "machine started");
            self.notify_start(data, driver)?;
        }
        Ok(())
    }

    fn on_cancelling(&mut self, data: &mut D, driver: &mut dyn FsmHandler<D>) {
        if self.started {
            debug!(fsm = %self.id, state = %self.current_state_name(), "machine cancelled");
            self.notify_cancel(data, driver);
        }
        self.full_reinit(data);
    }

    fn replay(&mut self, data: &mut D, driver: &mut dyn FsmHandler<D>) {
        let pending = std::mem::take(&mut self.queue);
        for event in pending {
            debug!(fsm = %self.id, "replaying recycled event");
            self.dispatch(event, data, driver);
        }
    }

    fn arm_timeout(&mut self, data: &mut D, driver: &mut dyn FsmHandler<D>) {
        self.timer.disarm();
        let timeout = self.states[self.current]
            .transitions
            .iter()
            .copied()
            .find(|&t| self.transitions[t].is_timeout());
        let Some(t) = timeout else {
            return;
        };
        let millis = match &self.transitions[t].edge {
            Edge::Timeout(edge) => (edge.millis)(),
            _ => return,
        };
        if self.timer.arm(t, millis) == Armed::Immediate {
            self.fire_timeout(t, data, driver);
        }
    }

    fn set_current(&mut self, target: usize) {
        let change = StateChange::now(self.state_label(self.current), self.state_label(target));
        self.current = target;
        trace!(fsm = %self.id, from = %change.from, to = %change.to, "state changed");
        self.publish_change(change);
    }

    fn publish_change(&mut self, change: StateChange) {
        if let Some(history) = &mut self.history {
            history.record(change.clone());
        }
        self.changes.publish(change);
    }

    fn enter_sub(&mut self, t: usize, event: E, data: &mut D, driver: &mut dyn FsmHandler<D>) {
        self.timer.disarm();
        debug!(fsm = %self.id, state = %self.state_label(self.current), "sub-machine entered");
        self.active_sub = Some(t);
        self.forward_to_sub(t, event, data, driver);
    }

    fn forward_to_sub(
        &mut self,
        t: usize,
        event: E,
        data: &mut D,
        driver: &mut dyn FsmHandler<D>,
    ) -> bool {
        let mut recorder = Recorder::default();
        let fired = match &mut self.transitions[t].edge {
            Edge::Sub(sub) => sub.machine.dispatch(event, data, &mut recorder),
            _ => false,
        };
        self.settle_sub(t, recorder.outcomes, data, driver);
        fired
    }

    /// React to what the running sub-machine did during the last call.
    fn settle_sub(
        &mut self,
        t: usize,
        outcomes: Vec<Outcome>,
        data: &mut D,
        driver: &mut dyn FsmHandler<D>,
    ) {
        self.mirror_sub_changes(t);
        for outcome in outcomes {
            if self.active_sub != Some(t) {
                break;
            }
            let settled = match outcome {
                Outcome::Started => self.check_starting(None, data, driver),
                Outcome::Updated if self.started => self.notify_update(data, driver),
                Outcome::Updated => Ok(()),
                Outcome::Stopped => {
                    self.leave_sub(t, data, driver);
                    Ok(())
                }
                Outcome::Cancelled => {
                    debug!(fsm = %self.id, "sub-machine cancelled");
                    self.detach_sub(data, false);
                    Err(CancelFsm)
                }
            };
            if settled.is_err() {
                self.on_cancelling(data, driver);
                break;
            }
        }
    }

    fn leave_sub(&mut self, t: usize, data: &mut D, driver: &mut dyn FsmHandler<D>) {
        debug!(fsm = %self.id, "sub-machine stopped");
        if let Edge::Sub(sub) = &self.transitions[t].edge {
            if let Some(action) = &sub.action {
                action(data);
            }
        }
        self.detach_sub(data, false);
        let target = self.transitions[t].target;
        self.enter(target, data, driver);
    }

    fn detach_sub(&mut self, data: &mut D, full: bool) {
        let Some(t) = self.active_sub.take() else {
            return;
        };
        if let Edge::Sub(sub) = &mut self.transitions[t].edge {
            if full {
                sub.machine.full_reinit(data);
            } else {
                sub.machine.reinit(data);
            }
            // Moves made by the sub-machine after it ended are not mirrored
            sub.changes.try_iter().for_each(drop);
        }
    }

    fn mirror_sub_changes(&mut self, t: usize) {
        let changes: Vec<StateChange> = match &self.transitions[t].edge {
            Edge::Sub(sub) => sub.changes.try_iter().collect(),
            _ => return,
        };
        for change in changes {
            self.publish_change(change);
        }
    }

    fn notify_start(&mut self, data: &D, driver: &mut dyn FsmHandler<D>) -> Result<(), CancelFsm> {
        driver.on_start(data)?;
        self.handlers
            .iter_mut()
            .try_for_each(|(_, handler)| handler.on_start(data))
    }

    fn notify_update(&mut self, data: &D, driver: &mut dyn FsmHandler<D>) -> Result<(), CancelFsm> {
        trace!(fsm = %self.id, "machine updated");
        driver.on_update(data)?;
        self.handlers
            .iter_mut()
            .try_for_each(|(_, handler)| handler.on_update(data))
    }

    fn notify_stop(&mut self, data: &D, driver: &mut dyn FsmHandler<D>) -> Result<(), CancelFsm> {
        driver.on_stop(data)?;
        self.handlers
            .iter_mut()
            .try_for_each(|(_, handler)| handler.on_stop(data))
    }

    fn notify_cancel(&mut self, data: &D, driver: &mut dyn FsmHandler<D>) {
        driver.on_cancel(data);
        for (_, handler) in &mut self.handlers {
            handler.on_cancel(data);
        }
    }
}

impl<E: Clone + 'static, D: Default + 'static> Machine<E, D> for Fsm<E, D> {
    fn process_with(&mut self, event: E, data: &mut D, driver: &mut dyn FsmHandler<D>) -> bool {
        self.dispatch(event, data, driver)
    }

    fn pump_with(&mut self, data: &mut D, driver: &mut dyn FsmHandler<D>) -> bool {
        if self.uninstalled {
            return false;
        }
        let mut fired = false;
        if let Some(t) = self.timer.take_due() {
            self.fire_timeout(t, data, driver);
            fired = true;
        }
        if let Some(t) = self.active_sub {
            let mut recorder = Recorder::default();
            let inner_fired = match &mut self.transitions[t].edge {
                Edge::Sub(sub) => sub.machine.pump_with(data, &mut recorder),
                _ => false,
            };
            self.settle_sub(t, recorder.outcomes, data, driver);
            fired |= inner_fired;
        }
        fired
    }

    fn reinit(&mut self, data: &mut D) {
        debug!(fsm = %self.id, "machine reinitialised");
        self.timer.disarm();
        self.started = false;
        self.detach_sub(data, false);
        if self.current != INIT && !self.uninstalled {
            self.set_current(INIT);
        }
        if !self.inner {
            *data = D::default();
        }
    }

    fn full_reinit(&mut self, data: &mut D) {
        self.queue.clear();
        self.detach_sub(data, true);
        self.reinit(data);
    }

    fn uninstall(&mut self) {
        debug!(fsm = %self.id, "machine uninstalled");
        self.timer.disarm();
        self.queue.clear();
        self.active_sub = None;
        for transition in &mut self.transitions {
            if let Edge::Sub(sub) = &mut transition.edge {
                sub.machine.uninstall();
            }
        }
        self.transitions.clear();
        self.states.clear();
        self.handlers.clear();
        self.changes.close();
        self.started = false;
        self.current = INIT;
        self.uninstalled = true;
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn is_at_init(&self) -> bool {
        self.current == INIT && self.active_sub.is_none()
    }

    fn current_state_name(&self) -> &str {
        if let Some(t) = self.active_sub {
            if let Edge::Sub(sub) = &self.transitions[t].edge {
                return sub.machine.current_state_name();
            }
        }
        self.state_label(self.current)
    }

    fn accepted_kinds(&self) -> Vec<&'static str> {
        if let Some(t) = self.active_sub {
            if let Edge::Sub(sub) = &self.transitions[t].edge {
                return sub.machine.accepted_kinds();
            }
        }
        self.kinds_from(self.current)
    }

    fn set_owner_waker(&mut self, waker: Arc<dyn OwnerWaker>) {
        for transition in &mut self.transitions {
            if let Edge::Sub(sub) = &mut transition.edge {
                sub.machine.set_owner_waker(waker.clone());
            }
        }
        self.timer.set_waker(waker);
    }

    fn set_inner(&mut self, inner: bool) {
        self.inner = inner;
    }

    fn is_inner(&self) -> bool {
        self.inner
    }

    fn add_handler(&mut self, handler: Box<dyn FsmHandler<D>>) -> HandlerId {
        let id = HandlerId::new();
        self.handlers.push((id, handler));
        id
    }

    fn remove_handler(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }
}

impl<E, D> std::fmt::Debug for Fsm<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fsm")
            .field("id", &self.id)
            .field("states", &self.states.len())
            .field("transitions", &self.transitions.len())
            .field("current", &self.current)
            .field("started", &self.started)
            .field("inner", &self.inner)
            .field("queued", &self.queue.len())
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}
