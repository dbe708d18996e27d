//! Runtime settings.
//!
//! Every field has a default, so a settings file only lists what it
//! changes:
//!
//! ```rust
//! use actuate::config::Settings;
//!
//! let settings = Settings::from_json_str(r#"{ "throttle_ms": 16 }"#).unwrap();
//! assert_eq!(settings.throttle_ms, 16);
//! assert_eq!(settings.registry_capacity, 50);
//! ```

use crate::command::{CommandRegistry, DEFAULT_REGISTRY_CAPACITY, DEFAULT_UNDO_CAPACITY};
use crate::fsm::Machine;
use crate::interaction::Interaction;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Throttle delay, capacities and binding flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minimum delay between two dispatched events of the same kind.
    /// Zero disables throttling.
    pub throttle_ms: u64,
    pub registry_capacity: usize,
    pub undo_capacity: usize,
    pub continuous_execution: bool,
    pub strict_start: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            throttle_ms: 0,
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            continuous_execution: false,
            strict_start: false,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Resize a registry and its undo collector.
    pub fn apply_to_registry(&self, registry: &CommandRegistry) {
        registry.set_capacity(self.registry_capacity);
        registry.undo_collector().set_capacity(self.undo_capacity);
        debug!(
            registry_capacity = self.registry_capacity,
            undo_capacity = self.undo_capacity,
            "registry settings applied"
        );
    }

    pub fn apply_to_interaction<E, D, M>(&self, interaction: &mut Interaction<E, D, M>)
    where
        E: Clone + 'static,
        D: Default + 'static,
        M: Machine<E, D>,
    {
        interaction.set_throttle_timeout(self.throttle_ms);
    }
}
