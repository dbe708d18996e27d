//! State change records and the optional per-machine trail.
//!
//! Every cursor move of a machine produces a [`StateChange`]. Collaborators
//! that mirror interaction progress (visual feedback, debugging overlays)
//! subscribe to them; machines can also keep a bounded [`StateHistory`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single move of the current-state cursor.
///
/// # Example
///
/// ```rust
/// use actuate::core::StateChange;
///
/// let change = StateChange::now("init", "pressed");
/// assert_eq!(change.from, "init");
/// assert_eq!(change.to, "pressed");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Name of the state being left
    pub from: String,
    /// Name of the state now current
    pub to: String,
    /// When the cursor moved
    pub timestamp: DateTime<Utc>,
}

impl StateChange {
    /// Create a change stamped with the current time.
    pub fn now(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Bounded, ordered trail of state changes.
///
/// Once `capacity` changes are held, recording a new one drops the oldest.
///
/// # Example
///
/// ```rust
/// use actuate::core::{StateChange, StateHistory};
///
/// let mut history = StateHistory::with_capacity(8);
/// history.record(StateChange::now("init", "pressed"));
/// history.record(StateChange::now("pressed", "init"));
///
/// let path = history.get_path();
/// assert_eq!(path, vec!["init", "pressed", "init"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateHistory {
    changes: VecDeque<StateChange>,
    capacity: usize,
}

impl StateHistory {
    /// Create an empty history keeping at most `capacity` changes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            changes: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Maximum number of changes kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a change, evicting the oldest one when full.
    pub fn record(&mut self, change: StateChange) {
        if self.capacity == 0 {
            return;
        }
        if self.changes.len() == self.capacity {
            self.changes.pop_front();
        }
        self.changes.push_back(change);
    }

    /// Names of the states traversed: the first `from`, then every `to`.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.changes.len() + 1);
        if let Some(first) = self.changes.front() {
            path.push(first.from.as_str());
        }
        path.extend(self.changes.iter().map(|c| c.to.as_str()));
        path
    }

    /// Time between the first and last recorded change.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.changes.front()?, self.changes.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// Recorded changes, oldest first.
    pub fn changes(&self) -> impl Iterator<Item = &StateChange> {
        self.changes.iter()
    }

    /// Number of recorded changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Drop every recorded change.
    pub fn clear(&mut self) {
        self.changes.clear();
    }
}
