//! Bounded registry of executed commands.

use crate::channel::{lock, Publisher};
use crate::command::{same_command, Command, RegistrationPolicy, SharedCommand, UndoCollector};
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, trace};

/// Default number of commands kept by a registry.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 50;

struct Registered {
    commands: Vec<SharedCommand>,
    capacity: usize,
}

/// Ordered, bounded collection of commands that had an effect.
///
/// Adding past capacity evicts and flushes the oldest command whose policy
/// is not [`RegistrationPolicy::Unlimited`]. Undoable commands are also
/// pushed on the registry's [`UndoCollector`]. Every mutation happens under
/// a single lock, so a registry can be shared between threads.
///
/// # Example
///
/// ```rust
/// use actuate::command::{AnonCommand, Command, CommandRegistry, CommandStatus};
///
/// let registry = CommandRegistry::with_capacity(1);
/// let first = AnonCommand::shared("first", || Ok(()));
/// let second = AnonCommand::shared("second", || Ok(()));
///
/// assert!(registry.add(first.clone()));
/// assert!(registry.add(second));
///
/// assert_eq!(registry.len(), 1);
/// assert_eq!(first.lock().unwrap().status(), CommandStatus::Flushed);
/// ```
pub struct CommandRegistry {
    registered: Mutex<Registered>,
    added: Publisher<SharedCommand>,
    undo: Arc<UndoCollector>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REGISTRY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registered: Mutex::new(Registered {
                commands: Vec::new(),
                capacity,
            }),
            added: Publisher::new(),
            undo: Arc::new(UndoCollector::new()),
        }
    }

    /// Use `undo` instead of a private collector.
    pub fn with_undo_collector(mut self, undo: Arc<UndoCollector>) -> Self {
        self.undo = undo;
        self
    }

    /// Process-wide default registry.
    pub fn global() -> Arc<CommandRegistry> {
        static GLOBAL: OnceLock<Arc<CommandRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(CommandRegistry::new())).clone()
    }

    /// Register a command.
    ///
    /// Rejected when the command is already registered, or when the
    /// capacity is zero and the command is not unlimited. Commands the new
    /// one supersedes are removed and flushed first.
    pub fn add(&self, command: SharedCommand) -> bool {
        let policy = lock(&command).registration_policy();

        let dropped = {
            let mut registered = lock(&self.registered);
            let present = registered.commands.iter().any(|c| same_command(c, &command));
            if present || (registered.capacity == 0 && policy != RegistrationPolicy::Unlimited) {
                trace!(present, "command not registered");
                return false;
            }

            let mut dropped = drain_superseded(&mut registered.commands, &command);
            if registered.commands.len() >= registered.capacity {
                let evictable = registered
                    .commands
                    .iter()
                    .position(|c| lock(c).registration_policy() != RegistrationPolicy::Unlimited);
                if let Some(index) = evictable {
                    dropped.push(registered.commands.remove(index));
                }
            }
            registered.commands.push(command.clone());
            dropped
        };

        flush_all(&dropped);
        debug!(
            command = lock(&command).name(),
            dropped = dropped.len(),
            "command registered"
        );
        self.added.publish(command.clone());

        let undoable = lock(&command).as_undoable().is_some();
        if undoable {
            self.undo.add(command);
        }
        true
    }

    /// Remove and flush the registered commands `command` supersedes.
    pub fn unregister_superseded(&self, command: &SharedCommand) {
        let dropped = drain_superseded(&mut lock(&self.registered).commands, command);
        flush_all(&dropped);
    }

    /// Remove and flush a command. Returns whether it was registered.
    pub fn remove(&self, command: &SharedCommand) -> bool {
        let removed = {
            let mut registered = lock(&self.registered);
            let index = registered.commands.iter().position(|c| same_command(c, command));
            index.map(|index| registered.commands.remove(index))
        };
        match removed {
            Some(removed) => {
                lock(&removed).flush();
                true
            }
            None => false,
        }
    }

    /// Cancel, remove and flush a command.
    pub fn cancel_command(&self, command: &SharedCommand) {
        lock(command).cancel();
        if !self.remove(command) {
            lock(command).flush();
        }
    }

    /// Flush and drop every registered command.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut lock(&self.registered).commands);
        flush_all(&dropped);
    }

    pub fn capacity(&self) -> usize {
        lock(&self.registered).capacity
    }

    /// Change the capacity, evicting and flushing the oldest evictable
    /// commands that no longer fit.
    pub fn set_capacity(&self, capacity: usize) {
        let dropped = {
            let mut registered = lock(&self.registered);
            registered.capacity = capacity;
            let mut dropped = Vec::new();
            while registered.commands.len() > capacity {
                let evictable = registered
                    .commands
                    .iter()
                    .position(|c| lock(c).registration_policy() != RegistrationPolicy::Unlimited);
                match evictable {
                    Some(index) => dropped.push(registered.commands.remove(index)),
                    None => break,
                }
            }
            dropped
        };
        if !dropped.is_empty() {
            debug!(capacity, evicted = dropped.len(), "registry shrunk");
        }
        flush_all(&dropped);
    }

    /// Snapshot of the registered commands, oldest first.
    pub fn commands(&self) -> Vec<SharedCommand> {
        lock(&self.registered).commands.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.registered).commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, command: &SharedCommand) -> bool {
        lock(&self.registered)
            .commands
            .iter()
            .any(|c| same_command(c, command))
    }

    /// Receive every command registered from now on.
    pub fn subscribe(&self) -> Receiver<SharedCommand> {
        self.added.subscribe()
    }

    pub fn undo_collector(&self) -> Arc<UndoCollector> {
        self.undo.clone()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered = lock(&self.registered);
        f.debug_struct("CommandRegistry")
            .field("commands", &registered.commands.len())
            .field("capacity", &registered.capacity)
            .field("undo", &self.undo)
            .finish()
    }
}

/// Take out the commands that `newer` supersedes.
fn drain_superseded(commands: &mut Vec<SharedCommand>, newer: &SharedCommand) -> Vec<SharedCommand> {
    let newer_guard = lock(newer);
    let mut superseded = Vec::new();
    let mut index = 0;
    while index < commands.len() {
        let candidate = &commands[index];
        if !same_command(candidate, newer) && lock(candidate).unregistered_by(&*newer_guard) {
            superseded.push(commands.remove(index));
        } else {
            index += 1;
        }
    }
    superseded
}

fn flush_all(commands: &[SharedCommand]) {
    for command in commands {
        lock(command).flush();
    }
}
