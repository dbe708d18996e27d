//! Machine observer turning interaction lifecycles into command lifecycles.

use crate::binding::executor::CommandExecutor;
use crate::channel::{lock, Publisher};
use crate::command::{
    Cmd, Command, CommandBody, CommandRegistry, CommandStatus, RegistrationPolicy, SharedCommand,
};
use crate::error::{BindingError, CommandError, ErrorCatcher, ReportedError};
use crate::fsm::{CancelFsm, FsmHandler};
use crate::interaction::OwnerWaker;
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

pub(crate) type Producer<D, B> = Box<dyn Fn(&D) -> Result<B, CommandError>>;
pub(crate) type When<D> = Box<dyn Fn(&D) -> bool>;
pub(crate) type DataHook<B, D> = Box<dyn FnMut(&mut B, &D)>;
pub(crate) type Hook<B> = Box<dyn FnMut(&mut B)>;

/// Optional user hooks of a binding.
pub(crate) struct Hooks<B, D> {
    pub(crate) when: Option<When<D>>,
    pub(crate) first: Option<DataHook<B, D>>,
    pub(crate) then: Option<DataHook<B, D>>,
    pub(crate) end: Option<Hook<B>>,
    pub(crate) cancel: Option<Hook<B>>,
    pub(crate) end_or_cancel: Option<Hook<B>>,
    pub(crate) if_had_effects: Option<Hook<B>>,
    pub(crate) if_had_no_effect: Option<Hook<B>>,
    pub(crate) if_cannot_execute: Option<Hook<B>>,
    pub(crate) unbind: Option<Hook<B>>,
}

impl<B, D> Default for Hooks<B, D> {
    fn default() -> Self {
        Self {
            when: None,
            first: None,
            then: None,
            end: None,
            cancel: None,
            end_or_cancel: None,
            if_had_effects: None,
            if_had_no_effect: None,
            if_cannot_execute: None,
            unbind: None,
        }
    }
}

fn run<B: CommandBody>(hook: &mut Option<Hook<B>>, command: &Arc<Mutex<Cmd<B>>>) {
    if let Some(hook) = hook {
        hook(lock(command).body_mut());
    }
}

/// Result of a command executed by a [`CommandExecutor`].
struct Completion<B> {
    command: Arc<Mutex<Cmd<B>>>,
    ok: bool,
}

pub(crate) struct BindingEngine<D, B> {
    producer: Producer<D, B>,
    hooks: Hooks<B, D>,
    pub(crate) continuous: bool,
    pub(crate) strict_start: bool,
    executor: Option<Arc<dyn CommandExecutor>>,
    registry: Arc<CommandRegistry>,
    errors: Arc<ErrorCatcher>,
    waker: Arc<dyn OwnerWaker>,
    command: Option<Arc<Mutex<Cmd<B>>>>,
    completed: Publisher<SharedCommand>,
    completions_tx: Sender<Completion<B>>,
    completions_rx: Receiver<Completion<B>>,
    pub(crate) times_ended: u64,
    pub(crate) times_cancelled: u64,
    fatal: Option<BindingError>,
}

pub(crate) struct EngineParts<D, B> {
    pub(crate) producer: Producer<D, B>,
    pub(crate) hooks: Hooks<B, D>,
    pub(crate) continuous: bool,
    pub(crate) strict_start: bool,
    pub(crate) executor: Option<Arc<dyn CommandExecutor>>,
    pub(crate) registry: Arc<CommandRegistry>,
    pub(crate) errors: Arc<ErrorCatcher>,
    pub(crate) waker: Arc<dyn OwnerWaker>,
}

impl<D: 'static, B: CommandBody> BindingEngine<D, B> {
    pub(crate) fn new(parts: EngineParts<D, B>) -> Self {
        let (completions_tx, completions_rx) = crossbeam_channel::unbounded();
        Self {
            producer: parts.producer,
            hooks: parts.hooks,
            continuous: parts.continuous,
            strict_start: parts.strict_start,
            executor: parts.executor,
            registry: parts.registry,
            errors: parts.errors,
            waker: parts.waker,
            command: None,
            completed: Publisher::new(),
            completions_tx,
            completions_rx,
            times_ended: 0,
            times_cancelled: 0,
            fatal: None,
        }
    }

    pub(crate) fn command(&self) -> Option<Arc<Mutex<Cmd<B>>>> {
        self.command.clone()
    }

    pub(crate) fn set_waker(&mut self, waker: Arc<dyn OwnerWaker>) {
        self.waker = waker;
    }

    pub(crate) fn subscribe_completed(&self) -> Receiver<SharedCommand> {
        self.completed.subscribe()
    }

    pub(crate) fn close(&mut self) {
        self.completed.close();
    }

    pub(crate) fn take_fatal(&mut self) -> Option<BindingError> {
        self.fatal.take()
    }

    fn when(&self, data: &D) -> bool {
        self.hooks.when.as_ref().map_or(true, |when| when(data))
    }

    /// Produce the command and run `first`. A failing producer is reported
    /// and leaves no command.
    fn create(&mut self, data: &D) {
        match (self.producer)(data) {
            Ok(body) => {
                let mut cmd = Cmd::new(body);
                if let Some(first) = &mut self.hooks.first {
                    first(cmd.body_mut(), data);
                }
                debug!(command = cmd.name(), "command created");
                self.command = Some(Arc::new(Mutex::new(cmd)));
            }
            Err(source) => self.errors.report(ReportedError::ProducerFailed { source }),
        }
    }

    fn then(&mut self, command: &Arc<Mutex<Cmd<B>>>, data: &D) {
        if let Some(then) = &mut self.hooks.then {
            then(lock(command).body_mut(), data);
        }
    }

    fn report_execution_error(&self, command: &Arc<Mutex<Cmd<B>>>) {
        let mut guard = lock(command);
        if let Some(source) = guard.take_error() {
            let name = guard.name().to_string();
            drop(guard);
            self.errors.report(ReportedError::ExecutionFailed { command: name, source });
        }
    }

    fn execute(&mut self, command: Arc<Mutex<Cmd<B>>>) {
        match self.executor.clone() {
            Some(executor) => {
                trace!("command dispatched to executor");
                let done = self.completions_tx.clone();
                let waker = self.waker.clone();
                executor.execute(Box::new(move || {
                    let ok = lock(&command).do_it();
                    if done.send(Completion { command, ok }).is_ok() {
                        waker.wake();
                    }
                }));
            }
            None => {
                let ok = lock(&command).do_it();
                self.after_executed(command, ok);
            }
        }
    }

    /// Finish an executed command. A successful command is completed,
    /// registered and published; a failed one only reaches
    /// `if_cannot_execute`.
    fn after_executed(&mut self, command: Arc<Mutex<Cmd<B>>>, ok: bool) {
        if !ok {
            debug!("command could not execute");
            self.report_execution_error(&command);
            run(&mut self.hooks.if_cannot_execute, &command);
            run(&mut self.hooks.unbind, &command);
            return;
        }

        lock(&command).done();
        run(&mut self.hooks.end, &command);
        run(&mut self.hooks.end_or_cancel, &command);

        let (had_effect, policy) = {
            let guard = lock(&command);
            (guard.had_effect(), guard.registration_policy())
        };
        debug!(had_effect, ?policy, "command executed");

        let shared: SharedCommand = command.clone();
        if had_effect {
            if policy != RegistrationPolicy::None {
                self.registry.add(shared.clone());
            } else {
                self.registry.unregister_superseded(&shared);
            }
            run(&mut self.hooks.if_had_effects, &command);
        } else {
            run(&mut self.hooks.if_had_no_effect, &command);
        }
        run(&mut self.hooks.unbind, &command);
        self.completed.publish(shared);
    }

    /// Finish the commands executed asynchronously since the last call.
    pub(crate) fn drain_completions(&mut self) -> bool {
        let completions: Vec<_> = self.completions_rx.try_iter().collect();
        let any = !completions.is_empty();
        for Completion { command, ok } in completions {
            self.after_executed(command, ok);
        }
        any
    }

    /// Drop the in-progress command after deactivation.
    pub(crate) fn release(&mut self) {
        if let Some(command) = self.command.take() {
            run(&mut self.hooks.unbind, &command);
            lock(&command).flush();
            debug!("in-progress command flushed");
        }
    }
}

impl<D: 'static, B: CommandBody> FsmHandler<D> for BindingEngine<D, B> {
    fn on_start(&mut self, data: &D) -> Result<(), CancelFsm> {
        let ok = self.when(data);
        debug!(ok, "binding starts");

        if ok {
            self.create(data);
        } else if self.strict_start {
            debug!("strict binding cancels its interaction");
            return Err(CancelFsm);
        }
        Ok(())
    }

    fn on_update(&mut self, data: &D) -> Result<(), CancelFsm> {
        if !self.when(data) {
            trace!("binding update skipped");
            return Ok(());
        }
        if self.command.is_none() {
            self.create(data);
        }
        let Some(command) = self.command.clone() else {
            return Ok(());
        };

        self.then(&command, data);
        if self.continuous && lock(&command).can_execute() {
            let ok = lock(&command).do_it();
            if !ok {
                self.report_execution_error(&command);
                run(&mut self.hooks.if_cannot_execute, &command);
            }
        }
        Ok(())
    }

    fn on_stop(&mut self, data: &D) -> Result<(), CancelFsm> {
        if !self.when(data) {
            if let Some(command) = self.command.take() {
                debug!("binding condition failed at stop, command cancelled");
                lock(&command).cancel();
                run(&mut self.hooks.unbind, &command);
            }
            return Ok(());
        }

        if self.command.is_none() {
            self.create(data);
        }
        let Some(command) = self.command.take() else {
            return Ok(());
        };
        if !self.continuous {
            self.then(&command, data);
        }
        self.times_ended += 1;
        self.execute(command);
        Ok(())
    }

    fn on_cancel(&mut self, _data: &D) {
        self.times_cancelled += 1;
        let Some(command) = self.command.take() else {
            return;
        };

        let (name, took_effect) = {
            let mut guard = lock(&command);
            let took_effect = guard.had_effect() || guard.status() == CommandStatus::Executed;
            guard.cancel();
            (guard.name().to_string(), took_effect)
        };
        debug!(command = %name, took_effect, "binding cancelled");
        run(&mut self.hooks.unbind, &command);

        if self.continuous && took_effect {
            let undone = lock(&command).as_undoable().map(|undoable| undoable.undo());
            match undone {
                Some(Ok(())) => debug!(command = %name, "continuous command undone"),
                Some(Err(source)) => self.errors.report(ReportedError::UndoFailed {
                    command: name,
                    source,
                }),
                None => {
                    let err = BindingError::MustBeUndoable { command: name };
                    self.errors.report(err.clone().into());
                    self.fatal = Some(err);
                }
            }
        }

        run(&mut self.hooks.cancel, &command);
        run(&mut self.hooks.end_or_cancel, &command);
    }
}
