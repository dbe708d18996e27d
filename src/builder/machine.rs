//! Builder for interaction machines.

use crate::builder::error::ConfigErrors;
use crate::builder::transition::{EventEdge, SubEdge, TimeoutEdge};
use crate::builder::validate::{EdgeShape, GraphShape};
use crate::core::{StateKind, StateNode};
use crate::fsm::transition::{Edge, SubMachine, Transition};
use crate::fsm::{Fsm, Machine};
use std::collections::HashMap;
use stillwater::validation::Validation;
use tracing::debug;
use uuid::Uuid;

const INIT_NAME: &str = "init";

enum PendingEdge<E, D> {
    Event(EventEdge<E, D>),
    Timeout(TimeoutEdge<D>),
    Sub(SubEdge<E, D>),
}

struct PendingTransition<E, D> {
    from: String,
    to: String,
    edge: PendingEdge<E, D>,
}

/// Builder for [`Fsm`] with a fluent API.
///
/// States are referred to by name. The init state exists from the start
/// and is named `"init"`. Transitions are tried in the order they are
/// added. [`build`](Self::build) validates the whole graph and reports
/// every problem found at once.
///
/// # Example
///
/// ```rust
/// use actuate::builder::{EventEdge, FsmBuilder, TimeoutEdge};
///
/// #[derive(Clone, PartialEq)]
/// enum Click {
///     Press,
///     Release,
/// }
///
/// type Edge = EventEdge<Click, ()>;
///
/// let fsm = FsmBuilder::new()
///     .std_state("pressed")
///     .terminal_state("clicked")
///     .cancelling_state("held")
///     .on("init", "pressed", Edge::on("press", |e| *e == Click::Press))
///     .on("pressed", "clicked", Edge::on("release", |e| *e == Click::Release))
///     .on_timeout("pressed", "held", TimeoutEdge::millis(1000))
///     .build();
///
/// assert!(fsm.is_ok());
///
/// let broken = FsmBuilder::new()
///     .std_state("pressed")
///     .on("pressed", "init", Edge::on("release", |e| *e == Click::Release))
///     .build();
///
/// // The init state has no way out, `pressed` is unreachable and init is targeted.
/// assert_eq!(broken.unwrap_err().len(), 3);
/// ```
pub struct FsmBuilder<E, D> {
    states: Vec<(String, StateKind)>,
    transitions: Vec<PendingTransition<E, D>>,
    starting: Option<String>,
}

impl<E: Clone + 'static, D: Default + 'static> FsmBuilder<E, D> {
    /// Create a builder holding only the init state.
    pub fn new() -> Self {
        Self {
            states: vec![(INIT_NAME.to_string(), StateKind::Init)],
            transitions: Vec::new(),
            starting: None,
        }
    }

    /// Declare an intermediate state.
    pub fn std_state(self, name: impl Into<String>) -> Self {
        self.state(name, StateKind::Standard)
    }

    /// Declare a state ending the interaction normally.
    pub fn terminal_state(self, name: impl Into<String>) -> Self {
        self.state(name, StateKind::Terminal)
    }

    /// Declare a state ending the interaction abnormally.
    pub fn cancelling_state(self, name: impl Into<String>) -> Self {
        self.state(name, StateKind::Cancelling)
    }

    fn state(mut self, name: impl Into<String>, kind: StateKind) -> Self {
        self.states.push((name.into(), kind));
        self
    }

    /// Add an event transition.
    pub fn on(self, from: impl Into<String>, to: impl Into<String>, edge: impl Into<EventEdge<E, D>>) -> Self {
        self.transition(from, to, PendingEdge::Event(edge.into()))
    }

    /// Add a timeout transition. A state may declare at most one.
    pub fn on_timeout(self, from: impl Into<String>, to: impl Into<String>, edge: TimeoutEdge<D>) -> Self {
        self.transition(from, to, PendingEdge::Timeout(edge))
    }

    /// Add a transition running an embedded machine.
    pub fn sub_fsm(self, from: impl Into<String>, to: impl Into<String>, edge: impl Into<SubEdge<E, D>>) -> Self {
        self.transition(from, to, PendingEdge::Sub(edge.into()))
    }

    fn transition(mut self, from: impl Into<String>, to: impl Into<String>, edge: PendingEdge<E, D>) -> Self {
        self.transitions.push(PendingTransition {
            from: from.into(),
            to: to.into(),
            edge,
        });
        self
    }

    /// State whose entry starts the interaction. By default the interaction
    /// starts as soon as the machine leaves init.
    pub fn starting_state(mut self, name: impl Into<String>) -> Self {
        self.starting = Some(name.into());
        self
    }

    fn shape(&self) -> GraphShape<'_> {
        GraphShape {
            states: self.states.iter().map(|(name, kind)| (name.as_str(), *kind)).collect(),
            edges: self
                .transitions
                .iter()
                .map(|t| EdgeShape {
                    from: &t.from,
                    to: &t.to,
                    no_kinds: matches!(&t.edge, PendingEdge::Event(edge) if edge.kinds.is_empty()),
                    timeout: matches!(t.edge, PendingEdge::Timeout(_)),
                })
                .collect(),
            starting: self.starting.as_deref(),
        }
    }

    /// Validate the graph and build the machine.
    pub fn build(self) -> Result<Fsm<E, D>, ConfigErrors> {
        if let Validation::Failure(errors) = self.shape().validate() {
            let mut unique = Vec::new();
            for err in errors.iter() {
                if !unique.contains(err) {
                    unique.push(err.clone());
                }
            }
            return Err(ConfigErrors(unique));
        }

        let id = Uuid::new_v4();
        let index: HashMap<String, usize> = self
            .states
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        let mut states: Vec<StateNode> = self
            .states
            .into_iter()
            .map(|(name, kind)| StateNode::new(name, kind))
            .collect();

        let mut transitions = Vec::with_capacity(self.transitions.len());
        for pending in self.transitions {
            let source = index[&pending.from];
            let target = index[&pending.to];
            let edge = match pending.edge {
                PendingEdge::Event(edge) => Edge::Event(edge),
                PendingEdge::Timeout(edge) => Edge::Timeout(edge),
                PendingEdge::Sub(sub) => {
                    let mut machine = sub.machine;
                    machine.set_inner(true);
                    let changes = machine.subscribe_state_changes();
                    Edge::Sub(SubMachine {
                        machine,
                        action: sub.action,
                        changes,
                    })
                }
            };
            states[source].transitions.push(transitions.len());
            transitions.push(Transition { source, target, edge });
        }

        let starting = self.starting.map(|name| index[&name]);
        debug!(
            fsm = %id,
            states = states.len(),
            transitions = transitions.len(),
            "built machine"
        );

        Ok(Fsm::from_parts(id, states, transitions, starting))
    }
}

impl<E: Clone + 'static, D: Default + 'static> Default for FsmBuilder<E, D> {
    fn default() -> Self {
        Self::new()
    }
}
