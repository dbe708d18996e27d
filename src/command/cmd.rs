//! Status-managing wrapper around a command body.

use crate::command::{Command, CommandBody, CommandId, CommandStatus, RegistrationPolicy, SharedCommand, Undoable};
use crate::error::CommandError;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// A command body plus its lifecycle status.
pub struct Cmd<B> {
    id: CommandId,
    body: B,
    status: CommandStatus,
    created_at: DateTime<Utc>,
    memento_taken: bool,
    last_error: Option<CommandError>,
}

impl<B: CommandBody> Cmd<B> {
    pub fn new(body: B) -> Self {
        Self {
            id: CommandId::new(),
            body,
            status: CommandStatus::Created,
            created_at: Utc::now(),
            memento_taken: false,
            last_error: None,
        }
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    /// Wrap into a handle registries can store.
    pub fn into_shared(self) -> SharedCommand {
        Arc::new(Mutex::new(self))
    }
}

impl<B: CommandBody> Command for Cmd<B> {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &str {
        self.body.name()
    }

    fn status(&self) -> CommandStatus {
        self.status
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn can_execute(&self) -> bool {
        self.body.can_execute()
    }

    fn do_it(&mut self) -> bool {
        if !self.status.can_run() || !self.body.can_execute() {
            trace!(command = self.body.name(), status = %self.status, "command not executed");
            return false;
        }

        if !self.memento_taken {
            self.body.create_memento();
            self.memento_taken = true;
        }

        match self.body.execute() {
            Ok(()) => {
                self.status = CommandStatus::Executed;
                debug!(command = self.body.name(), id = %self.id, "command executed");
                true
            }
            Err(err) => {
                debug!(command = self.body.name(), error = %err, "command execution failed");
                self.last_error = Some(err);
                false
            }
        }
    }

    fn done(&mut self) {
        if self.status.can_run() {
            self.status = CommandStatus::Done;
        }
    }

    fn cancel(&mut self) {
        self.status = CommandStatus::Cancelled;
    }

    fn flush(&mut self) {
        if self.status != CommandStatus::Flushed {
            self.status = CommandStatus::Flushed;
            self.body.flush();
        }
    }

    fn had_effect(&self) -> bool {
        self.body.had_effect(self.status)
    }

    fn registration_policy(&self) -> RegistrationPolicy {
        self.body.registration_policy(self.had_effect())
    }

    fn unregistered_by(&self, newer: &dyn Command) -> bool {
        self.body.unregistered_by(newer)
    }

    fn as_undoable(&mut self) -> Option<&mut dyn Undoable> {
        self.body.as_undoable()
    }

    fn body_any(&self) -> &dyn Any {
        &self.body
    }

    fn take_error(&mut self) -> Option<CommandError> {
        self.last_error.take()
    }
}

impl<B> std::fmt::Debug for Cmd<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cmd")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
