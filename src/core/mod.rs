//! Core state machine types.
//!
//! This module contains the pure data of interaction state machines:
//! - State handles and kinds
//! - Guard predicates over events and interaction data
//! - State change records and the bounded history trail
//!
//! Nothing in this module performs I/O or owns threads.

mod guard;
mod history;
mod state;

pub use guard::Guard;
pub use history::{StateChange, StateHistory};
pub use state::{StateId, StateKind};

pub(crate) use state::StateNode;
