//! Bounded undo and redo stacks.

use crate::channel::{lock, Publisher};
use crate::command::{Command, SharedCommand};
use crate::error::CommandError;
use crossbeam_channel::Receiver;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Default number of commands kept on the undo stack.
pub const DEFAULT_UNDO_CAPACITY: usize = 30;

struct Stacks {
    undo: VecDeque<SharedCommand>,
    redo: VecDeque<SharedCommand>,
    capacity: usize,
}

/// Undo and redo stacks of undoable commands.
///
/// The tops of both stacks are published every time they change, so menus
/// and toolbars can refresh their labels.
///
/// # Example
///
/// ```rust
/// use actuate::command::{Cmd, CommandBody, UndoCollector, Undoable};
/// use actuate::error::CommandError;
///
/// struct Toggle(bool);
///
/// impl CommandBody for Toggle {
///     fn execute(&mut self) -> Result<(), CommandError> {
///         self.0 = !self.0;
///         Ok(())
///     }
///
///     fn as_undoable(&mut self) -> Option<&mut dyn Undoable> {
///         Some(self)
///     }
/// }
///
/// impl Undoable for Toggle {
///     fn undo(&mut self) -> Result<(), CommandError> {
///         self.0 = !self.0;
///         Ok(())
///     }
///
///     fn redo(&mut self) -> Result<(), CommandError> {
///         self.execute()
///     }
/// }
///
/// let collector = UndoCollector::new();
/// collector.add(Cmd::new(Toggle(false)).into_shared());
///
/// assert_eq!(collector.undo(), Ok(true));
/// assert_eq!(collector.redo_len(), 1);
/// assert_eq!(collector.redo(), Ok(true));
/// assert_eq!(collector.undo_len(), 1);
/// ```
pub struct UndoCollector {
    stacks: Mutex<Stacks>,
    undos: Publisher<Option<SharedCommand>>,
    redos: Publisher<Option<SharedCommand>>,
}

impl UndoCollector {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_UNDO_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stacks: Mutex::new(Stacks {
                undo: VecDeque::new(),
                redo: VecDeque::new(),
                capacity,
            }),
            undos: Publisher::new(),
            redos: Publisher::new(),
        }
    }

    /// Push an undoable command. Clears the redo stack and drops the oldest
    /// entry when full. Returns whether the command was kept.
    pub fn add(&self, command: SharedCommand) -> bool {
        let (undo_top, redo_top) = {
            let mut stacks = lock(&self.stacks);
            if stacks.capacity == 0 {
                return false;
            }
            if stacks.undo.len() >= stacks.capacity {
                stacks.undo.pop_front();
            }
            stacks.undo.push_back(command);
            stacks.redo.clear();
            (stacks.undo.back().cloned(), None)
        };
        self.undos.publish(undo_top);
        self.redos.publish(redo_top);
        true
    }

    /// Undo the last command and move it to the redo stack.
    ///
    /// Returns `Ok(false)` when there is nothing to undo. A failing undo
    /// leaves the command on the undo stack. The collector is locked while
    /// the command reverts, so `Undoable::undo` must not call back into it.
    pub fn undo(&self) -> Result<bool, CommandError> {
        // The stacks stay locked while reverting so a concurrent `add`
        // cannot clear the redo stack between the pop and the push.
        let (undo_top, redo_top) = {
            let mut stacks = lock(&self.stacks);
            let Some(command) = stacks.undo.pop_back() else {
                return Ok(false);
            };
            if let Err(err) = revert(&command, Direction::Undo) {
                stacks.undo.push_back(command);
                return Err(err);
            }
            stacks.redo.push_back(command);
            (stacks.undo.back().cloned(), stacks.redo.back().cloned())
        };

        self.undos.publish(undo_top);
        self.redos.publish(redo_top);
        Ok(true)
    }

    /// Redo the last undone command and move it back to the undo stack.
    /// Locks the collector like [`undo`](Self::undo).
    pub fn redo(&self) -> Result<bool, CommandError> {
        let (undo_top, redo_top) = {
            let mut stacks = lock(&self.stacks);
            let Some(command) = stacks.redo.pop_back() else {
                return Ok(false);
            };
            if let Err(err) = revert(&command, Direction::Redo) {
                stacks.redo.push_back(command);
                return Err(err);
            }
            stacks.undo.push_back(command);
            (stacks.undo.back().cloned(), stacks.redo.back().cloned())
        };

        self.undos.publish(undo_top);
        self.redos.publish(redo_top);
        Ok(true)
    }

    pub fn last_undo(&self) -> Option<SharedCommand> {
        lock(&self.stacks).undo.back().cloned()
    }

    pub fn last_redo(&self) -> Option<SharedCommand> {
        lock(&self.stacks).redo.back().cloned()
    }

    /// Label of the next undo, falling back to the command name.
    pub fn last_undo_message(&self) -> Option<String> {
        self.last_undo().map(|command| message(&command))
    }

    /// Label of the next redo, falling back to the command name.
    pub fn last_redo_message(&self) -> Option<String> {
        self.last_redo().map(|command| message(&command))
    }

    pub fn undo_len(&self) -> usize {
        lock(&self.stacks).undo.len()
    }

    pub fn redo_len(&self) -> usize {
        lock(&self.stacks).redo.len()
    }

    pub fn capacity(&self) -> usize {
        lock(&self.stacks).capacity
    }

    /// Change the capacity, dropping the oldest entries that no longer fit.
    pub fn set_capacity(&self, capacity: usize) {
        let changed = {
            let mut stacks = lock(&self.stacks);
            stacks.capacity = capacity;
            let mut changed = false;
            while stacks.undo.len() > capacity {
                stacks.undo.pop_front();
                changed = true;
            }
            while stacks.redo.len() > capacity {
                stacks.redo.pop_front();
                changed = true;
            }
            changed.then(|| (stacks.undo.back().cloned(), stacks.redo.back().cloned()))
        };
        if let Some((undo_top, redo_top)) = changed {
            debug!(capacity, "undo stacks trimmed");
            self.undos.publish(undo_top);
            self.redos.publish(redo_top);
        }
    }

    /// Empty both stacks.
    pub fn clear(&self) {
        {
            let mut stacks = lock(&self.stacks);
            stacks.undo.clear();
            stacks.redo.clear();
        }
        self.undos.publish(None);
        self.redos.publish(None);
    }

    /// Receive the new top of the undo stack each time it changes.
    pub fn subscribe_undos(&self) -> Receiver<Option<SharedCommand>> {
        self.undos.subscribe()
    }

    /// Receive the new top of the redo stack each time it changes.
    pub fn subscribe_redos(&self) -> Receiver<Option<SharedCommand>> {
        self.redos.subscribe()
    }
}

impl Default for UndoCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UndoCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stacks = lock(&self.stacks);
        f.debug_struct("UndoCollector")
            .field("undo", &stacks.undo.len())
            .field("redo", &stacks.redo.len())
            .field("capacity", &stacks.capacity)
            .finish()
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Undo,
    Redo,
}

fn revert(command: &SharedCommand, direction: Direction) -> Result<(), CommandError> {
    let mut guard = lock(command);
    let name = guard.name().to_string();
    let Some(undoable) = guard.as_undoable() else {
        return Err(CommandError::NotUndoable(name));
    };
    match direction {
        Direction::Undo => undoable.undo(),
        Direction::Redo => undoable.redo(),
    }
}

fn message(command: &SharedCommand) -> String {
    let mut guard = lock(command);
    let name = guard.name().to_string();
    guard
        .as_undoable()
        .and_then(|undoable| undoable.undo_name())
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{same_command, Cmd, CommandBody, Undoable};
    use crossbeam_channel::{Receiver, Sender};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Step {
        total: Arc<AtomicI32>,
        by: i32,
        broken: bool,
    }

    impl CommandBody for Step {
        fn name(&self) -> &str {
            "step"
        }

        fn execute(&mut self) -> Result<(), CommandError> {
            self.total.fetch_add(self.by, Ordering::SeqCst);
            Ok(())
        }

        fn as_undoable(&mut self) -> Option<&mut dyn Undoable> {
            Some(self)
        }
    }

    impl Undoable for Step {
        fn undo(&mut self) -> Result<(), CommandError> {
            if self.broken {
                return Err(CommandError::Undo("stuck".into()));
            }
            self.total.fetch_sub(self.by, Ordering::SeqCst);
            Ok(())
        }

        fn redo(&mut self) -> Result<(), CommandError> {
            self.execute()
        }

        fn undo_name(&self) -> Option<String> {
            Some(format!("step by {}", self.by))
        }
    }

    fn step(total: &Arc<AtomicI32>, by: i32) -> SharedCommand {
        let mut cmd = Cmd::new(Step {
            total: total.clone(),
            by,
            broken: false,
        });
        cmd.do_it();
        cmd.into_shared()
    }

    #[test]
    fn undo_then_redo_restores_same_command() {
        let total = Arc::new(AtomicI32::new(0));
        let collector = UndoCollector::new();
        let first = step(&total, 2);
        collector.add(first.clone());

        assert_eq!(collector.undo(), Ok(true));
        assert_eq!(total.load(Ordering::SeqCst), 0);
        assert_eq!(collector.redo(), Ok(true));
        assert_eq!(total.load(Ordering::SeqCst), 2);

        let top = collector.last_undo().unwrap();
        assert!(same_command(&top, &first));
    }

    #[test]
    fn new_command_clears_redo() {
        let total = Arc::new(AtomicI32::new(0));
        let collector = UndoCollector::new();
        collector.add(step(&total, 1));
        collector.undo().unwrap();
        assert_eq!(collector.redo_len(), 1);

        collector.add(step(&total, 5));

        assert_eq!(collector.redo_len(), 0);
        assert_eq!(collector.undo_len(), 1);
    }

    #[test]
    fn oldest_entry_is_dropped_when_full() {
        let total = Arc::new(AtomicI32::new(0));
        let collector = UndoCollector::with_capacity(2);
        let first = step(&total, 1);
        collector.add(first.clone());
        collector.add(step(&total, 2));
        collector.add(step(&total, 3));

        assert_eq!(collector.undo_len(), 2);
        collector.undo().unwrap();
        collector.undo().unwrap();
        assert_eq!(collector.undo(), Ok(false));
        assert_eq!(total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let total = Arc::new(AtomicI32::new(0));
        let collector = UndoCollector::with_capacity(0);

        assert!(!collector.add(step(&total, 1)));
        assert_eq!(collector.undo_len(), 0);
    }

    #[test]
    fn failed_undo_stays_on_undo_stack() {
        let total = Arc::new(AtomicI32::new(0));
        let collector = UndoCollector::new();
        let mut broken = Cmd::new(Step {
            total: total.clone(),
            by: 4,
            broken: true,
        });
        broken.do_it();
        collector.add(broken.into_shared());

        assert_eq!(collector.undo(), Err(CommandError::Undo("stuck".into())));
        assert_eq!(collector.undo_len(), 1);
        assert_eq!(collector.redo_len(), 0);
        assert_eq!(total.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn messages_use_undo_name() {
        let total = Arc::new(AtomicI32::new(0));
        let collector = UndoCollector::new();
        collector.add(step(&total, 7));

        assert_eq!(collector.last_undo_message().as_deref(), Some("step by 7"));
        assert_eq!(collector.last_redo_message(), None);
    }

    #[test]
    fn stack_tops_are_published() {
        let total = Arc::new(AtomicI32::new(0));
        let collector = UndoCollector::new();
        let undos = collector.subscribe_undos();
        let redos = collector.subscribe_redos();

        collector.add(step(&total, 1));
        collector.undo().unwrap();

        let undo_tops: Vec<bool> = undos.try_iter().map(|top| top.is_some()).collect();
        let redo_tops: Vec<bool> = redos.try_iter().map(|top| top.is_some()).collect();
        assert_eq!(undo_tops, vec![true, false]);
        assert_eq!(redo_tops, vec![false, true]);
    }

    #[test]
    fn shrinking_capacity_trims_oldest() {
        let total = Arc::new(AtomicI32::new(0));
        let collector = UndoCollector::new();
        for by in 1..=4 {
            collector.add(step(&total, by));
        }

        collector.set_capacity(1);

        assert_eq!(collector.undo_len(), 1);
        assert_eq!(collector.last_undo_message().as_deref(), Some("step by 4"));
    }

    /// Undo that announces itself and waits to be released.
    struct Gated {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl CommandBody for Gated {
        fn execute(&mut self) -> Result<(), CommandError> {
            Ok(())
        }

        fn as_undoable(&mut self) -> Option<&mut dyn Undoable> {
            Some(self)
        }
    }

    impl Undoable for Gated {
        fn undo(&mut self) -> Result<(), CommandError> {
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(2));
            Ok(())
        }

        fn redo(&mut self) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[test]
    fn add_during_undo_still_clears_redo() {
        let total = Arc::new(AtomicI32::new(0));
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let collector = Arc::new(UndoCollector::new());
        collector.add(
            Cmd::new(Gated {
                entered: entered_tx,
                release: release_rx,
            })
            .into_shared(),
        );

        let undoing = {
            let collector = collector.clone();
            thread::spawn(move || collector.undo())
        };
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let adding = {
            let collector = collector.clone();
            let fresh = step(&total, 1);
            thread::spawn(move || collector.add(fresh))
        };
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert_eq!(undoing.join().unwrap(), Ok(true));
        assert!(adding.join().unwrap());
        assert_eq!(collector.redo_len(), 0);
        assert_eq!(collector.undo_len(), 1);
        assert_eq!(collector.last_undo_message().as_deref(), Some("step by 1"));
    }

    #[test]
    fn concurrent_adds_and_undos_respect_capacity() {
        let total = Arc::new(AtomicI32::new(0));
        let collector = Arc::new(UndoCollector::with_capacity(5));

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let collector = collector.clone();
                let total = total.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        if (worker + i) % 3 == 0 {
                            collector.undo().unwrap();
                        } else {
                            collector.add(step(&total, 1));
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(collector.undo_len() <= 5);
        assert!(collector.redo_len() <= 5);
    }
}
