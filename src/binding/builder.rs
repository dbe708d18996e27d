//! Builder for bindings.

use crate::binding::engine::{BindingEngine, EngineParts, Hooks, Producer};
use crate::binding::executor::CommandExecutor;
use crate::binding::Binding;
use crate::builder::ConfigError;
use crate::command::{CommandBody, CommandRegistry};
use crate::config::Settings;
use crate::error::{CommandError, ErrorCatcher};
use crate::fsm::{Fsm, Machine};
use crate::interaction::{noop_waker, Interaction, OwnerWaker};
use std::sync::Arc;
use tracing::debug;

/// Builder pairing an interaction with a command producer.
///
/// Only the producer is required. Registry and error catcher default to the
/// process-wide instances.
///
/// # Example
///
/// ```rust
/// use actuate::binding::BindingBuilder;
/// use actuate::builder::single_event;
/// use actuate::command::{AnonCommand, CommandRegistry};
/// use actuate::interaction::Interaction;
/// use std::sync::Arc;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Key {
///     Enter,
///     Escape,
/// }
///
/// let registry = Arc::new(CommandRegistry::new());
/// let mut binding = BindingBuilder::new(Interaction::new(single_event::<Key, (), _>(
///     "enter",
///     |k| *k == Key::Enter,
/// )))
/// .producer(|_: &()| Ok(AnonCommand::new("submit", || Ok(()))))
/// .registry(registry.clone())
/// .build()
/// .unwrap();
///
/// assert!(!binding.process_event(Key::Escape).unwrap());
/// assert!(binding.process_event(Key::Enter).unwrap());
/// assert_eq!(binding.times_ended(), 1);
/// assert_eq!(registry.len(), 1);
/// ```
pub struct BindingBuilder<E, D, B, M = Fsm<E, D>> {
    interaction: Interaction<E, D, M>,
    producer: Option<Producer<D, B>>,
    hooks: Hooks<B, D>,
    continuous: bool,
    strict_start: bool,
    executor: Option<Arc<dyn CommandExecutor>>,
    registry: Option<Arc<CommandRegistry>>,
    errors: Option<Arc<ErrorCatcher>>,
    waker: Option<Arc<dyn OwnerWaker>>,
}

impl<E, D, B, M> BindingBuilder<E, D, B, M>
where
    E: Clone + 'static,
    D: Default + 'static,
    B: CommandBody,
    M: Machine<E, D>,
{
    pub fn new(interaction: Interaction<E, D, M>) -> Self {
        Self {
            interaction,
            producer: None,
            hooks: Hooks::default(),
            continuous: false,
            strict_start: false,
            executor: None,
            registry: None,
            errors: None,
            waker: None,
        }
    }

    /// Function creating the command from the interaction data.
    pub fn producer<F>(mut self, producer: F) -> Self
    where
        F: Fn(&D) -> Result<B, CommandError> + 'static,
    {
        self.producer = Some(Box::new(producer));
        self
    }

    /// Condition checked at start, update and stop.
    pub fn when<F>(mut self, when: F) -> Self
    where
        F: Fn(&D) -> bool + 'static,
    {
        self.hooks.when = Some(Box::new(when));
        self
    }

    /// Called once the command is created.
    pub fn first<F>(mut self, first: F) -> Self
    where
        F: FnMut(&mut B, &D) + 'static,
    {
        self.hooks.first = Some(Box::new(first));
        self
    }

    /// Called on every interaction update, and at stop for non-continuous
    /// bindings.
    pub fn then<F>(mut self, then: F) -> Self
    where
        F: FnMut(&mut B, &D) + 'static,
    {
        self.hooks.then = Some(Box::new(then));
        self
    }

    pub fn end<F>(mut self, end: F) -> Self
    where
        F: FnMut(&mut B) + 'static,
    {
        self.hooks.end = Some(Box::new(end));
        self
    }

    pub fn cancel<F>(mut self, cancel: F) -> Self
    where
        F: FnMut(&mut B) + 'static,
    {
        self.hooks.cancel = Some(Box::new(cancel));
        self
    }

    pub fn end_or_cancel<F>(mut self, end_or_cancel: F) -> Self
    where
        F: FnMut(&mut B) + 'static,
    {
        self.hooks.end_or_cancel = Some(Box::new(end_or_cancel));
        self
    }

    pub fn if_had_effects<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut B) + 'static,
    {
        self.hooks.if_had_effects = Some(Box::new(hook));
        self
    }

    pub fn if_had_no_effect<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut B) + 'static,
    {
        self.hooks.if_had_no_effect = Some(Box::new(hook));
        self
    }

    pub fn if_cannot_execute<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut B) + 'static,
    {
        self.hooks.if_cannot_execute = Some(Box::new(hook));
        self
    }

    /// Release whatever the command was bound to in the host toolkit.
    pub fn unbind<F>(mut self, unbind: F) -> Self
    where
        F: FnMut(&mut B) + 'static,
    {
        self.hooks.unbind = Some(Box::new(unbind));
        self
    }

    /// Execute the command on every update, undoing it if the interaction
    /// is cancelled.
    pub fn continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    /// Cancel the interaction when the start condition does not hold.
    pub fn strict_start(mut self, strict_start: bool) -> Self {
        self.strict_start = strict_start;
        self
    }

    /// Run commands through an executor instead of on the calling thread.
    pub fn executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn registry(mut self, registry: Arc<CommandRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn errors(mut self, errors: Arc<ErrorCatcher>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn waker(mut self, waker: Arc<dyn OwnerWaker>) -> Self {
        self.waker = Some(waker);
        self
    }

    /// Apply the binding flags and throttle delay of `settings`.
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.continuous = settings.continuous_execution;
        self.strict_start = settings.strict_start;
        settings.apply_to_interaction(&mut self.interaction);
        self
    }

    pub fn build(self) -> Result<Binding<E, D, B, M>, ConfigError> {
        let producer = self.producer.ok_or(ConfigError::MissingProducer)?;
        let waker = self.waker.unwrap_or_else(noop_waker);

        let mut interaction = self.interaction;
        interaction.set_owner_waker(waker.clone());

        debug!(
            continuous = self.continuous,
            strict_start = self.strict_start,
            asynchronous = self.executor.is_some(),
            "binding built"
        );

        let engine = BindingEngine::new(EngineParts {
            producer,
            hooks: self.hooks,
            continuous: self.continuous,
            strict_start: self.strict_start,
            executor: self.executor,
            registry: self.registry.unwrap_or_else(CommandRegistry::global),
            errors: self.errors.unwrap_or_else(ErrorCatcher::global),
            waker,
        });
        Ok(Binding::from_parts(interaction, engine))
    }
}
