//! Bindings: interactions turned into commands.
//!
//! A [`Binding`] owns one [`Interaction`] and drives it with a
//! machine observer that mirrors the interaction lifecycle onto a command:
//!
//! | Interaction | Command |
//! |---|---|
//! | start | produced, `first` hook |
//! | update | `then` hook, executed when continuous |
//! | stop | executed, registered, published |
//! | cancel | cancelled, undone when continuous |
//!
//! At most one command is in progress per binding. Executed commands that
//! had an effect go to the [`CommandRegistry`](crate::command::CommandRegistry)
//! and, when undoable, to its undo collector.

mod builder;
mod engine;
mod executor;

pub use builder::BindingBuilder;
pub use executor::{CommandExecutor, Job, ThreadExecutor};

use crate::channel::lock;
use crate::command::{Cmd, CommandBody, SharedCommand};
use crate::error::BindingError;
use crate::fsm::{Fsm, FsmHandler, Machine};
use crate::interaction::{Interaction, OwnerWaker};
use crossbeam_channel::Receiver;
use engine::BindingEngine;
use std::sync::{Arc, Mutex};
use tracing::info;

/// An interaction paired with a command producer.
pub struct Binding<E, D, B, M = Fsm<E, D>> {
    interaction: Interaction<E, D, M>,
    engine: BindingEngine<D, B>,
}

impl<E, D, B, M> Binding<E, D, B, M>
where
    E: Clone + 'static,
    D: Default + 'static,
    B: CommandBody,
    M: Machine<E, D>,
{
    pub(crate) fn from_parts(interaction: Interaction<E, D, M>, engine: BindingEngine<D, B>) -> Self {
        Self {
            interaction,
            engine,
        }
    }

    /// Feed one raw event to the interaction.
    ///
    /// Returns whether a transition fired. Fails only when a continuous
    /// binding had to cancel a command that took effect but cannot be undone.
    pub fn process_event(&mut self, event: E) -> Result<bool, BindingError> {
        let engine: &mut dyn FsmHandler<D> = &mut self.engine;
        let fired = self.interaction.process_event_with(event, engine);
        self.check()?;
        Ok(fired)
    }

    /// Finish asynchronously executed commands, then apply pending timeout
    /// and throttle signals. Call on the owning thread.
    pub fn pump(&mut self) -> Result<bool, BindingError> {
        let mut fired = self.engine.drain_completions();
        let engine: &mut dyn FsmHandler<D> = &mut self.engine;
        fired |= self.interaction.pump_with(engine);
        self.check()?;
        Ok(fired)
    }

    fn check(&mut self) -> Result<(), BindingError> {
        match self.engine.take_fatal() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Number of interactions that reached execution.
    pub fn times_ended(&self) -> u64 {
        self.engine.times_ended
    }

    /// Number of cancelled interactions.
    pub fn times_cancelled(&self) -> u64 {
        self.engine.times_cancelled
    }

    /// Command of the interaction in progress, if any.
    pub fn command(&self) -> Option<Arc<Mutex<Cmd<B>>>> {
        self.engine.command()
    }

    /// Run `f` on the body of the command in progress.
    pub fn with_command<R>(&self, f: impl FnOnce(&B) -> R) -> Option<R> {
        self.engine.command().map(|command| f(lock(&command).body()))
    }

    pub fn is_running(&self) -> bool {
        self.interaction.is_running()
    }

    pub fn is_continuous(&self) -> bool {
        self.engine.continuous
    }

    pub fn is_strict_start(&self) -> bool {
        self.engine.strict_start
    }

    /// Enable or disable the binding. Disabling aborts the interaction and
    /// flushes the command in progress.
    pub fn set_activated(&mut self, activated: bool) {
        info!(activated, "binding activation changed");
        self.interaction.set_activated(activated);
        if !activated {
            self.engine.release();
        }
    }

    pub fn is_activated(&self) -> bool {
        self.interaction.is_activated()
    }

    /// Abort the interaction in progress, cancelling its command.
    pub fn clear_events(&mut self) {
        if self.engine.command().is_some() {
            self.engine.on_cancel(self.interaction.data());
        }
        self.interaction.full_reinit();
    }

    /// Commands leaving the binding after execution.
    pub fn subscribe_completed(&self) -> Receiver<SharedCommand> {
        self.engine.subscribe_completed()
    }

    pub fn interaction(&self) -> &Interaction<E, D, M> {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut Interaction<E, D, M> {
        &mut self.interaction
    }

    /// Hook used by timers, the throttle worker and the executor to reach
    /// the owning thread.
    pub fn set_owner_waker(&mut self, waker: Arc<dyn OwnerWaker>) {
        self.interaction.set_owner_waker(waker.clone());
        self.engine.set_waker(waker);
    }

    /// Deactivate for good and disconnect the completion channel.
    pub fn uninstall(&mut self) {
        self.set_activated(false);
        self.interaction.uninstall();
        self.engine.close();
    }
}

impl<E, D, B, M> std::fmt::Debug for Binding<E, D, B, M>
where
    D: std::fmt::Debug,
    M: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("interaction", &self.interaction)
            .field("times_ended", &self.engine.times_ended)
            .field("times_cancelled", &self.engine.times_cancelled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EventEdge, FsmBuilder};
    use crate::command::{Command, CommandRegistry, CommandStatus, Undoable};
    use crate::error::{CommandError, ErrorCatcher, ReportedError};
    use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    enum Ev {
        Press,
        Move(i32),
        Release,
        Escape,
    }

    type Edge = EventEdge<Ev, Vec<i32>>;

    fn drag() -> Interaction<Ev, Vec<i32>> {
        let fsm = FsmBuilder::new()
            .std_state("pressed")
            .std_state("dragged")
            .terminal_state("released")
            .cancelling_state("cancelled")
            .on("init", "pressed", Edge::on("press", |e| *e == Ev::Press))
            .on(
                "pressed",
                "dragged",
                Edge::on("move", |e| matches!(e, Ev::Move(_))).action(push_move),
            )
            .on(
                "dragged",
                "dragged",
                Edge::on("move", |e| matches!(e, Ev::Move(_))).action(push_move),
            )
            .on("dragged", "released", Edge::on("release", |e| *e == Ev::Release))
            .on("pressed", "cancelled", Edge::on("escape", |e| *e == Ev::Escape))
            .on("dragged", "cancelled", Edge::on("escape", |e| *e == Ev::Escape))
            .build()
            .unwrap();
        Interaction::new(fsm)
    }

    fn push_move(e: &Ev, path: &mut Vec<i32>) {
        if let Ev::Move(x) = e {
            path.push(*x);
        }
    }

    /// Moves a shared position; undo restores the previous one.
    struct Translate {
        position: Arc<AtomicI32>,
        before: i32,
        target: i32,
        undoable: bool,
    }

    impl CommandBody for Translate {
        fn create_memento(&mut self) {
            self.before = self.position.load(Ordering::SeqCst);
        }

        fn execute(&mut self) -> Result<(), CommandError> {
            self.position.store(self.target, Ordering::SeqCst);
            Ok(())
        }

        fn as_undoable(&mut self) -> Option<&mut dyn Undoable> {
            if self.undoable {
                Some(self)
            } else {
                None
            }
        }
    }

    impl Undoable for Translate {
        fn undo(&mut self) -> Result<(), CommandError> {
            self.position.store(self.before, Ordering::SeqCst);
            Ok(())
        }

        fn redo(&mut self) -> Result<(), CommandError> {
            self.position.store(self.target, Ordering::SeqCst);
            Ok(())
        }
    }

    fn translate_binding(
        position: &Arc<AtomicI32>,
        undoable: bool,
    ) -> BindingBuilder<Ev, Vec<i32>, Translate> {
        let position = position.clone();
        BindingBuilder::new(drag())
            .producer(move |_| {
                Ok(Translate {
                    position: position.clone(),
                    before: 0,
                    target: 0,
                    undoable,
                })
            })
            .then(|cmd, path| cmd.target = path.last().copied().unwrap_or_default())
            .registry(Arc::new(CommandRegistry::new()))
            .errors(Arc::new(ErrorCatcher::new()))
    }

    #[test]
    fn stop_executes_and_registers_command() {
        let position = Arc::new(AtomicI32::new(0));
        let registry = Arc::new(CommandRegistry::new());
        let mut binding = translate_binding(&position, true)
            .registry(registry.clone())
            .build()
            .unwrap();
        let completed = binding.subscribe_completed();

        for ev in [Ev::Press, Ev::Move(3), Ev::Move(7), Ev::Release] {
            binding.process_event(ev).unwrap();
        }

        assert_eq!(position.load(Ordering::SeqCst), 7);
        assert_eq!(binding.times_ended(), 1);
        assert!(binding.command().is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.undo_collector().undo_len(), 1);

        let done = completed.try_recv().unwrap();
        assert_eq!(lock(&done).status(), CommandStatus::Done);
        assert!(completed.try_recv().is_err());
    }

    #[test]
    fn strict_start_cancels_without_creating_command() {
        let produced = Arc::new(AtomicU32::new(0));
        let counter = produced.clone();
        let mut binding = BindingBuilder::new(drag())
            .producer(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(crate::command::AnonCommand::new("never", || Ok(())))
            })
            .when(|_| false)
            .strict_start(true)
            .registry(Arc::new(CommandRegistry::new()))
            .build()
            .unwrap();

        binding.process_event(Ev::Press).unwrap();

        assert!(!binding.is_running());
        assert!(binding.command().is_none());
        assert_eq!(produced.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn lax_start_keeps_interaction_running() {
        let mut binding = BindingBuilder::new(drag())
            .producer(|_| Ok(crate::command::AnonCommand::new("later", || Ok(()))))
            .when(|path: &Vec<i32>| !path.is_empty())
            .registry(Arc::new(CommandRegistry::new()))
            .build()
            .unwrap();

        binding.process_event(Ev::Press).unwrap();
        assert!(binding.is_running());
        assert!(binding.command().is_none());

        binding.process_event(Ev::Move(1)).unwrap();
        assert!(binding.command().is_some());
    }

    #[test]
    fn continuous_cancel_undoes_executed_command_once() {
        let position = Arc::new(AtomicI32::new(0));
        let undos = Arc::new(AtomicU32::new(0));
        let counter = undos.clone();
        let mut binding = translate_binding(&position, true)
            .continuous(true)
            .cancel(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        binding.process_event(Ev::Press).unwrap();
        binding.process_event(Ev::Move(5)).unwrap();
        assert_eq!(position.load(Ordering::SeqCst), 5);
        let command = binding.command().unwrap();
        assert_eq!(lock(&command).status(), CommandStatus::Executed);

        binding.process_event(Ev::Escape).unwrap();

        assert_eq!(position.load(Ordering::SeqCst), 0);
        assert_eq!(lock(&command).status(), CommandStatus::Cancelled);
        assert_eq!(undos.load(Ordering::SeqCst), 1);
        assert_eq!(binding.times_cancelled(), 1);
        assert!(binding.command().is_none());
    }

    #[test]
    fn continuous_cancel_of_non_undoable_command_is_fatal() {
        let position = Arc::new(AtomicI32::new(0));
        let errors = Arc::new(ErrorCatcher::new());
        let reported = errors.subscribe();
        let mut binding = translate_binding(&position, false)
            .continuous(true)
            .errors(errors)
            .build()
            .unwrap();

        binding.process_event(Ev::Press).unwrap();
        binding.process_event(Ev::Move(2)).unwrap();
        let result = binding.process_event(Ev::Escape);

        assert!(matches!(result, Err(BindingError::MustBeUndoable { .. })));
        assert!(reported.try_recv().unwrap().is_fatal());
        assert!(binding.process_event(Ev::Press).is_ok());
    }

    #[test]
    fn failing_producer_is_reported() {
        let errors = Arc::new(ErrorCatcher::new());
        let reported = errors.subscribe();
        let mut binding = BindingBuilder::<_, _, crate::command::AnonCommand>::new(drag())
            .producer(|_| Err(CommandError::Producer("nothing selected".into())))
            .errors(errors)
            .registry(Arc::new(CommandRegistry::new()))
            .build()
            .unwrap();

        binding.process_event(Ev::Press).unwrap();

        assert!(binding.command().is_none());
        assert!(matches!(
            reported.try_recv().unwrap(),
            ReportedError::ProducerFailed { .. }
        ));
    }

    #[test]
    fn deactivation_flushes_command_in_progress() {
        let position = Arc::new(AtomicI32::new(0));
        let mut binding = translate_binding(&position, true).build().unwrap();

        binding.process_event(Ev::Press).unwrap();
        let command = binding.command().unwrap();
        binding.set_activated(false);

        assert!(!binding.is_running());
        assert!(binding.command().is_none());
        assert_eq!(lock(&command).status(), CommandStatus::Flushed);
        assert!(!binding.process_event(Ev::Press).unwrap());
    }

    #[test]
    fn clear_events_cancels_and_reinitialises() {
        let position = Arc::new(AtomicI32::new(0));
        let mut binding = translate_binding(&position, true).build().unwrap();

        binding.process_event(Ev::Press).unwrap();
        binding.process_event(Ev::Move(4)).unwrap();
        binding.clear_events();

        assert!(!binding.is_running());
        assert!(binding.interaction().data().is_empty());
        assert_eq!(binding.times_cancelled(), 1);
        assert_eq!(position.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn uninstall_disconnects_completion_channel() {
        let position = Arc::new(AtomicI32::new(0));
        let mut binding = translate_binding(&position, true).build().unwrap();
        let completed = binding.subscribe_completed();

        binding.uninstall();

        assert!(!binding.is_activated());
        assert!(completed.recv().is_err());
    }

    #[test]
    fn with_command_reads_body_in_progress() {
        let position = Arc::new(AtomicI32::new(0));
        let mut binding = translate_binding(&position, true).build().unwrap();

        binding.process_event(Ev::Press).unwrap();
        binding.process_event(Ev::Move(9)).unwrap();

        assert_eq!(binding.with_command(|cmd| cmd.target), Some(9));
    }

    #[test]
    fn failed_execution_is_neither_registered_nor_published() {
        let registry = Arc::new(CommandRegistry::new());
        let errors = Arc::new(ErrorCatcher::new());
        let reported = errors.subscribe();
        let refused = Arc::new(AtomicU32::new(0));
        let counter = refused.clone();
        let mut binding = BindingBuilder::<_, _, crate::command::AnonCommand>::new(drag())
            .producer(|_| {
                Ok(crate::command::AnonCommand::new("broken", || {
                    Err(CommandError::Execution("disk full".into()))
                }))
            })
            .if_cannot_execute(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .registry(registry.clone())
            .errors(errors)
            .build()
            .unwrap();
        let completed = binding.subscribe_completed();

        for ev in [Ev::Press, Ev::Move(1), Ev::Release] {
            binding.process_event(ev).unwrap();
        }

        assert_eq!(refused.load(Ordering::SeqCst), 1);
        assert_eq!(completed.try_iter().count(), 0);
        assert!(registry.is_empty());
        assert!(binding.command().is_none());
        assert!(matches!(
            reported.try_recv().unwrap(),
            ReportedError::ExecutionFailed { .. }
        ));
    }
}
