//! Well-formedness checks run by [`FsmBuilder::build`](super::FsmBuilder::build).
//!
//! Every check returns a `Validation` so a single pass reports all the
//! problems of a graph instead of stopping at the first one.

use crate::builder::error::ConfigError;
use crate::core::StateKind;
use std::collections::{HashMap, HashSet, VecDeque};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

pub(crate) type Check = Validation<(), NonEmptyVec<ConfigError>>;

/// Name-level view of a transition.
pub(crate) struct EdgeShape<'a> {
    pub(crate) from: &'a str,
    pub(crate) to: &'a str,
    pub(crate) no_kinds: bool,
    pub(crate) timeout: bool,
}

/// Name-level view of the whole graph.
pub(crate) struct GraphShape<'a> {
    pub(crate) states: Vec<(&'a str, StateKind)>,
    pub(crate) edges: Vec<EdgeShape<'a>>,
    pub(crate) starting: Option<&'a str>,
}

impl<'a> GraphShape<'a> {
    fn kinds(&self) -> HashMap<&'a str, StateKind> {
        self.states.iter().copied().collect()
    }

    /// Run every check, accumulating all violations.
    pub(crate) fn validate(&self) -> Check {
        let kinds = self.kinds();
        let mut checks = vec![self.check_duplicates()];
        checks.extend(self.edges.iter().map(|edge| check_edge(edge, &kinds)));
        checks.push(self.check_timeouts());
        checks.push(self.check_dead_ends());
        checks.push(self.check_reachability());
        checks.push(self.check_starting(&kinds));

        Validation::all_vec(checks).map(|_| ())
    }

    fn check_duplicates(&self) -> Check {
        let mut seen = HashSet::new();
        let checks: Vec<Check> = self
            .states
            .iter()
            .filter(|(name, _)| !seen.insert(*name))
            .map(|(name, _)| {
                Validation::fail(ConfigError::DuplicateState {
                    name: name.to_string(),
                })
            })
            .collect();
        Validation::all_vec(checks).map(|_| ())
    }

    /// A state arms at most one timer.
    fn check_timeouts(&self) -> Check {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for edge in self.edges.iter().filter(|edge| edge.timeout) {
            *counts.entry(edge.from).or_default() += 1;
        }
        let mut reported = HashSet::new();
        let checks: Vec<Check> = self
            .edges
            .iter()
            .filter(|edge| counts.get(edge.from).is_some_and(|&n| n > 1))
            .filter(|edge| reported.insert(edge.from))
            .map(|edge| {
                Validation::fail(ConfigError::MultipleTimeouts {
                    name: edge.from.to_string(),
                })
            })
            .collect();
        Validation::all_vec(checks).map(|_| ())
    }

    fn check_dead_ends(&self) -> Check {
        let sources: HashSet<&str> = self.edges.iter().map(|edge| edge.from).collect();
        let checks: Vec<Check> = self
            .states
            .iter()
            .filter(|(name, kind)| kind.can_emit() && !sources.contains(name))
            .map(|(name, _)| {
                Validation::fail(ConfigError::DeadEnd {
                    name: name.to_string(),
                })
            })
            .collect();
        Validation::all_vec(checks).map(|_| ())
    }

    fn check_reachability(&self) -> Check {
        let mut reached: HashSet<&str> = HashSet::new();
        let mut frontier: VecDeque<&str> = self.states.first().map(|(name, _)| *name).into_iter().collect();
        while let Some(state) = frontier.pop_front() {
            if !reached.insert(state) {
                continue;
            }
            frontier.extend(self.edges.iter().filter(|e| e.from == state).map(|e| e.to));
        }

        let checks: Vec<Check> = self
            .states
            .iter()
            .filter(|(name, kind)| *kind == StateKind::Standard && !reached.contains(name))
            .map(|(name, _)| {
                Validation::fail(ConfigError::Unreachable {
                    name: name.to_string(),
                })
            })
            .collect();
        Validation::all_vec(checks).map(|_| ())
    }

    fn check_starting(&self, kinds: &HashMap<&str, StateKind>) -> Check {
        let Some(name) = self.starting else {
            return Validation::success(());
        };
        match kinds.get(name) {
            None => Validation::fail(ConfigError::UnknownState {
                name: name.to_string(),
            }),
            Some(StateKind::Standard | StateKind::Terminal) => Validation::success(()),
            Some(_) => Validation::fail(ConfigError::InvalidStartingState {
                name: name.to_string(),
            }),
        }
    }
}

fn check_edge(edge: &EdgeShape<'_>, kinds: &HashMap<&str, StateKind>) -> Check {
    let mut checks: Vec<Check> = Vec::new();

    match kinds.get(edge.from) {
        None => checks.push(Validation::fail(ConfigError::UnknownState {
            name: edge.from.to_string(),
        })),
        Some(kind) if kind.is_final() => checks.push(Validation::fail(ConfigError::FinalSource {
            name: edge.from.to_string(),
        })),
        Some(StateKind::Init) if edge.timeout => {
            checks.push(Validation::fail(ConfigError::TimeoutFromInit))
        }
        Some(_) => {}
    }

    match kinds.get(edge.to) {
        None => checks.push(Validation::fail(ConfigError::UnknownState {
            name: edge.to.to_string(),
        })),
        Some(StateKind::Init) => checks.push(Validation::fail(ConfigError::InitTargeted {
            from: edge.from.to_string(),
        })),
        Some(_) => {}
    }

    if edge.no_kinds {
        checks.push(Validation::fail(ConfigError::NoEventKinds {
            from: edge.from.to_string(),
        }));
    }

    Validation::all_vec(checks).map(|_| ())
}
