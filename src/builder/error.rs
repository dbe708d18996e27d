//! Configuration errors for machine, interaction and binding construction.

use thiserror::Error;

/// A single construction problem.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("state `{name}` is declared twice")]
    DuplicateState { name: String },

    #[error("no state named `{name}`")]
    UnknownState { name: String },

    #[error("transition from `{from}` targets the init state")]
    InitTargeted { from: String },

    #[error("state `{name}` ends the interaction and cannot have outgoing transitions")]
    FinalSource { name: String },

    #[error("event transition from `{from}` declares no event kind")]
    NoEventKinds { from: String },

    #[error("timeout transition cannot leave the init state")]
    TimeoutFromInit,

    #[error("state `{name}` declares more than one timeout transition")]
    MultipleTimeouts { name: String },

    #[error("state `{name}` has no outgoing transition")]
    DeadEnd { name: String },

    #[error("state `{name}` is not reachable from the init state")]
    Unreachable { name: String },

    #[error("state `{name}` cannot be the starting state")]
    InvalidStartingState { name: String },

    #[error("a concurrent machine needs at least 2 members, got {count}")]
    TooFewMembers { count: usize },

    #[error("binding has no command producer. Call .producer(f) before .build()")]
    MissingProducer,
}

/// Every problem found by one validation pass.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid machine configuration: {}", render(.0))]
pub struct ConfigErrors(pub Vec<ConfigError>);

fn render(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigErrors {
    /// Problems in discovery order.
    pub fn errors(&self) -> &[ConfigError] {
        &self.0
    }

    /// Check if a given problem was found.
    pub fn contains(&self, err: &ConfigError) -> bool {
        self.0.contains(err)
    }

    /// Number of problems found.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for errors produced by validation.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ConfigError> for ConfigErrors {
    fn from(err: ConfigError) -> Self {
        ConfigErrors(vec![err])
    }
}
