//! Commands produced by interactions.
//!
//! A command goes through `Created -> Executed -> Done | Cancelled ->
//! Flushed`. User code implements [`CommandBody`] and lets [`Cmd`] manage
//! the status; the object-safe [`Command`] trait is what registries and
//! undo stacks store.
//!
//! # Example
//!
//! ```rust
//! use actuate::command::{Cmd, Command, CommandBody, CommandStatus};
//! use actuate::error::CommandError;
//!
//! struct Rename {
//!     target: String,
//! }
//!
//! impl CommandBody for Rename {
//!     fn can_execute(&self) -> bool {
//!         !self.target.is_empty()
//!     }
//!
//!     fn execute(&mut self) -> Result<(), CommandError> {
//!         self.target.make_ascii_uppercase();
//!         Ok(())
//!     }
//! }
//!
//! let mut cmd = Cmd::new(Rename { target: "draft".into() });
//! assert!(cmd.do_it());
//! cmd.done();
//!
//! assert_eq!(cmd.status(), CommandStatus::Done);
//! assert!(cmd.had_effect());
//! assert_eq!(cmd.body().target, "DRAFT");
//! ```

mod anon;
mod cmd;
mod registry;
mod undo;

pub use anon::AnonCommand;
pub use cmd::Cmd;
pub use registry::{CommandRegistry, DEFAULT_REGISTRY_CAPACITY};
pub use undo::{UndoCollector, DEFAULT_UNDO_CAPACITY};

use crate::error::CommandError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Lifecycle status of a command.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CommandStatus {
    Created,
    Executed,
    Done,
    Cancelled,
    Flushed,
}

impl CommandStatus {
    /// Check if the command may still execute.
    pub fn can_run(&self) -> bool {
        matches!(self, Self::Created | Self::Executed)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Executed => "executed",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Flushed => "flushed",
        };
        f.write_str(name)
    }
}

/// How a registry keeps a command.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum RegistrationPolicy {
    /// Never registered.
    None,
    /// Registered, evicted first when the registry is full.
    Limited,
    /// Registered and never evicted by capacity pressure.
    Unlimited,
}

/// Unique identifier of a command instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CommandId(Uuid);

impl CommandId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Behaviour of a command, written by users.
///
/// Only [`execute`](Self::execute) is required. Status bookkeeping is done
/// by [`Cmd`].
pub trait CommandBody: Send + 'static {
    /// Name used in logs and error reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Check if the command can run in the current context.
    fn can_execute(&self) -> bool {
        true
    }

    /// Capture the state needed to undo. Called once, before the first
    /// execution.
    fn create_memento(&mut self) {}

    /// Run the command.
    fn execute(&mut self) -> Result<(), CommandError>;

    /// Check if the command changed anything, given its status.
    fn had_effect(&self, status: CommandStatus) -> bool {
        status == CommandStatus::Done
    }

    /// How registries keep the command.
    fn registration_policy(&self, had_effect: bool) -> RegistrationPolicy {
        if had_effect {
            RegistrationPolicy::Limited
        } else {
            RegistrationPolicy::None
        }
    }

    /// Check if registering `newer` must remove this command from
    /// registries.
    fn unregistered_by(&self, _newer: &dyn Command) -> bool {
        false
    }

    /// Undo support, if any.
    fn as_undoable(&mut self) -> Option<&mut dyn Undoable> {
        None
    }

    /// Release resources. The command is never used again.
    fn flush(&mut self) {}
}

/// Commands that can be reverted.
pub trait Undoable {
    fn undo(&mut self) -> Result<(), CommandError>;

    fn redo(&mut self) -> Result<(), CommandError>;

    /// Label of the undo action, e.g. for a menu entry.
    fn undo_name(&self) -> Option<String> {
        None
    }
}

/// Object-safe command lifecycle, as stored by registries.
pub trait Command: Send {
    fn id(&self) -> CommandId;

    fn name(&self) -> &str;

    fn status(&self) -> CommandStatus;

    fn created_at(&self) -> DateTime<Utc>;

    fn can_execute(&self) -> bool;

    /// Execute the command if its status and context allow it. Returns
    /// whether it ran successfully.
    fn do_it(&mut self) -> bool;

    /// Mark the command as completed.
    fn done(&mut self);

    fn cancel(&mut self);

    /// Release the command for good.
    fn flush(&mut self);

    fn had_effect(&self) -> bool;

    fn registration_policy(&self) -> RegistrationPolicy;

    fn unregistered_by(&self, newer: &dyn Command) -> bool;

    fn as_undoable(&mut self) -> Option<&mut dyn Undoable>;

    /// The user body, for downcasting.
    fn body_any(&self) -> &dyn Any;

    /// Error of the last failed execution.
    fn take_error(&mut self) -> Option<CommandError>;

    fn is_done(&self) -> bool {
        self.status() == CommandStatus::Done
    }
}

/// Command shared between bindings, registries and undo stacks.
pub type SharedCommand = Arc<Mutex<dyn Command>>;

/// Check if two handles point to the same command.
pub fn same_command(a: &SharedCommand, b: &SharedCommand) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Execute a command outside any binding: run it, mark it done on success
/// and flush it in every case.
pub fn execute_and_flush(command: &mut dyn Command) -> bool {
    let ok = command.do_it();
    if ok {
        command.done();
    }
    command.flush();
    ok
}
