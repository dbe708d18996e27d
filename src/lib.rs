//! Actuate: from raw input events to undoable commands
//!
//! Actuate turns streams of low-level events (presses, moves, releases,
//! key strokes, touches) into commands. A finite-state machine recognises
//! each multi-step interaction; a binding mirrors the interaction lifecycle
//! onto a command, executes it and records it for undo.
//!
//! # Core Concepts
//!
//! - **Machines**: [`Fsm`] graphs with event, timeout and sub-machine
//!   transitions, built and validated by [`FsmBuilder`]
//! - **Interactions**: a machine plus its data, with activation and throttling
//! - **Commands**: user [`CommandBody`] values wrapped in a status lifecycle
//! - **Bindings**: start/update/stop/cancel turned into create/update/
//!   execute/cancel of a command
//! - **Registry**: bounded history of executed commands with an undo stack
//!
//! # Example
//!
//! ```rust
//! use actuate::binding::BindingBuilder;
//! use actuate::builder::{EventEdge, FsmBuilder};
//! use actuate::command::{AnonCommand, CommandRegistry};
//! use actuate::interaction::Interaction;
//! use std::sync::Arc;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Mouse {
//!     Press,
//!     Release,
//! }
//!
//! type Edge = EventEdge<Mouse, ()>;
//!
//! let click = FsmBuilder::new()
//!     .std_state("pressed")
//!     .terminal_state("released")
//!     .on("init", "pressed", Edge::on("press", |e| *e == Mouse::Press))
//!     .on("pressed", "released", Edge::on("release", |e| *e == Mouse::Release))
//!     .build()
//!     .unwrap();
//!
//! let registry = Arc::new(CommandRegistry::new());
//! let mut binding = BindingBuilder::new(Interaction::new(click))
//!     .producer(|_| Ok(AnonCommand::new("click", || Ok(()))))
//!     .registry(registry.clone())
//!     .build()
//!     .unwrap();
//!
//! binding.process_event(Mouse::Press).unwrap();
//! assert!(binding.is_running());
//! binding.process_event(Mouse::Release).unwrap();
//!
//! assert_eq!(binding.times_ended(), 1);
//! assert_eq!(registry.len(), 1);
//! ```

pub mod binding;
pub mod builder;
pub mod channel;
pub mod command;
pub mod config;
pub mod core;
pub mod error;
pub mod fsm;
pub mod interaction;

// Re-export commonly used types
pub use binding::{Binding, BindingBuilder};
pub use builder::{ConfigError, ConfigErrors, EventEdge, FsmBuilder, TimeoutEdge};
pub use command::{Cmd, Command, CommandBody, CommandRegistry, UndoCollector, Undoable};
pub use config::Settings;
pub use error::{BindingError, CommandError, ErrorCatcher, ReportedError};
pub use fsm::{CancelFsm, ConcurrentFsm, Fsm, FsmHandler, Machine};
pub use interaction::{Interaction, OwnerWaker};
