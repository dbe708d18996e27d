//! Closure-backed command.

use crate::command::{Cmd, CommandBody, SharedCommand};
use crate::error::CommandError;

type Action = Box<dyn FnMut() -> Result<(), CommandError> + Send>;

/// Command whose execution is a closure.
pub struct AnonCommand {
    name: String,
    action: Action,
}

impl AnonCommand {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnMut() -> Result<(), CommandError> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }

    /// Wrap directly into a [`Cmd`].
    pub fn cmd<F>(name: impl Into<String>, action: F) -> Cmd<AnonCommand>
    where
        F: FnMut() -> Result<(), CommandError> + Send + 'static,
    {
        Cmd::new(Self::new(name, action))
    }

    /// Wrap directly into a shared handle.
    pub fn shared<F>(name: impl Into<String>, action: F) -> SharedCommand
    where
        F: FnMut() -> Result<(), CommandError> + Send + 'static,
    {
        Self::cmd(name, action).into_shared()
    }
}

impl CommandBody for AnonCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> Result<(), CommandError> {
        (self.action)()
    }
}

impl std::fmt::Debug for AnonCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnonCommand").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandStatus};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_closure_and_reports_name() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let mut cmd = AnonCommand::cmd("bump", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(cmd.do_it());
        cmd.done();

        assert_eq!(cmd.name(), "bump");
        assert_eq!(cmd.status(), CommandStatus::Done);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
