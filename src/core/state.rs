//! State identifiers and kinds for interaction state machines.
//!
//! States are nodes of an arena-indexed graph owned by exactly one
//! [`Fsm`](crate::fsm::Fsm). They carry no behaviour of their own: the
//! [`StateKind`] decides what entering the state does to the machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Handle to a state inside one machine.
///
/// Handles are only meaningful for the builder that created them; the
/// machine id they carry lets the builder reject foreign states.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct StateId {
    pub(crate) machine: Uuid,
    pub(crate) index: usize,
}

impl StateId {
    pub(crate) fn new(machine: Uuid, index: usize) -> Self {
        Self { machine, index }
    }

    /// Position of the state in its machine's arena.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// What entering a state means for the machine.
///
/// # Example
///
/// ```rust
/// use actuate::core::StateKind;
///
/// assert!(StateKind::Terminal.is_final());
/// assert!(StateKind::Cancelling.is_error());
/// assert!(!StateKind::Init.can_enter());
/// assert!(StateKind::Standard.can_emit());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum StateKind {
    /// Entry point, one per machine, never re-entered mid-run.
    Init,
    /// Intermediate state.
    Standard,
    /// Normal end of an interaction.
    Terminal,
    /// Abnormal end of an interaction.
    Cancelling,
}

impl StateKind {
    /// Name of the kind for display/logging.
    pub fn name(&self) -> &str {
        match self {
            Self::Init => "Init",
            Self::Standard => "Standard",
            Self::Terminal => "Terminal",
            Self::Cancelling => "Cancelling",
        }
    }

    /// Check if entering this kind ends the run.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Terminal | Self::Cancelling)
    }

    /// Check if entering this kind ends the run abnormally.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Cancelling)
    }

    /// Check if transitions may leave a state of this kind.
    pub fn can_emit(&self) -> bool {
        matches!(self, Self::Init | Self::Standard)
    }

    /// Check if transitions may target a state of this kind.
    pub fn can_enter(&self) -> bool {
        !matches!(self, Self::Init)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node of the machine graph.
#[derive(Clone, Debug)]
pub(crate) struct StateNode {
    pub(crate) name: String,
    pub(crate) kind: StateKind,
    /// Outgoing transitions, in registration order.
    pub(crate) transitions: Vec<usize>,
}

impl StateNode {
    pub(crate) fn new(name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transitions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_name_returns_correct_value() {
        assert_eq!(StateKind::Init.name(), "Init");
        assert_eq!(StateKind::Standard.name(), "Standard");
        assert_eq!(StateKind::Terminal.name(), "Terminal");
        assert_eq!(StateKind::Cancelling.name(), "Cancelling");
    }

    #[test]
    fn is_final_identifies_ending_kinds() {
        assert!(!StateKind::Init.is_final());
        assert!(!StateKind::Standard.is_final());
        assert!(StateKind::Terminal.is_final());
        assert!(StateKind::Cancelling.is_final());
    }

    #[test]
    fn only_cancelling_is_error() {
        assert!(!StateKind::Init.is_error());
        assert!(!StateKind::Standard.is_error());
        assert!(!StateKind::Terminal.is_error());
        assert!(StateKind::Cancelling.is_error());
    }

    #[test]
    fn emit_and_enter_capabilities() {
        assert!(StateKind::Init.can_emit());
        assert!(!StateKind::Init.can_enter());
        assert!(StateKind::Standard.can_emit());
        assert!(StateKind::Standard.can_enter());
        assert!(!StateKind::Terminal.can_emit());
        assert!(StateKind::Terminal.can_enter());
        assert!(!StateKind::Cancelling.can_emit());
        assert!(StateKind::Cancelling.can_enter());
    }

    #[test]
    fn kind_serializes_correctly() {
        let json = serde_json::to_string(&StateKind::Terminal).unwrap();
        let deserialized: StateKind = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StateKind::Terminal);
    }

    #[test]
    fn state_ids_compare_by_machine_and_index() {
        let machine = Uuid::new_v4();
        let a = StateId::new(machine, 1);
        let b = StateId::new(machine, 1);
        let c = StateId::new(Uuid::new_v4(), 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.index(), 1);
    }
}
