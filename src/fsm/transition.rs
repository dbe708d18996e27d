//! Transition storage inside a machine.

use crate::builder::{EventEdge, TimeoutEdge};
use crate::core::StateChange;
use crate::fsm::Fsm;
use crossbeam_channel::Receiver;

/// Embedded machine of a sub-machine transition, plus the receiver used to
/// mirror its state changes on the outer machine.
pub(crate) struct SubMachine<E, D> {
    pub(crate) machine: Fsm<E, D>,
    pub(crate) action: Option<Box<dyn Fn(&mut D)>>,
    pub(crate) changes: Receiver<StateChange>,
}

pub(crate) enum Edge<E, D> {
    Event(EventEdge<E, D>),
    Timeout(TimeoutEdge<D>),
    Sub(SubMachine<E, D>),
}

/// Edge of the machine graph, owned by its source state.
pub(crate) struct Transition<E, D> {
    pub(crate) source: usize,
    pub(crate) target: usize,
    pub(crate) edge: Edge<E, D>,
}

impl<E: Clone + 'static, D: Default + 'static> Transition<E, D> {
    /// Check if the transition would fire for `event`.
    ///
    /// Timeout transitions never accept events.
    pub(crate) fn accepts(&self, event: &E, data: &D) -> bool {
        match &self.edge {
            Edge::Event(edge) => edge.accepts(event, data),
            Edge::Timeout(_) => false,
            Edge::Sub(sub) => sub.machine.accepts_from_init(event, data),
        }
    }

    pub(crate) fn is_timeout(&self) -> bool {
        matches!(self.edge, Edge::Timeout(_))
    }

    pub(crate) fn accepted_kinds(&self) -> Vec<&'static str> {
        match &self.edge {
            Edge::Event(edge) => edge.kinds.clone(),
            Edge::Timeout(_) => Vec::new(),
            Edge::Sub(sub) => sub.machine.kinds_from_init(),
        }
    }
}
