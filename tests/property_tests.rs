//! Property-based tests for machines, registries and interactions.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use actuate::builder::{EventEdge, FsmBuilder};
use actuate::command::{
    same_command, Cmd, Command, CommandBody, CommandRegistry, CommandStatus, RegistrationPolicy,
    SharedCommand, UndoCollector, Undoable,
};
use actuate::error::CommandError;
use actuate::fsm::{CancelFsm, Fsm, FsmHandler, Machine};
use actuate::interaction::Interaction;
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Registrable command with a fixed policy.
struct Entry {
    unlimited: bool,
}

impl CommandBody for Entry {
    fn execute(&mut self) -> Result<(), CommandError> {
        Ok(())
    }

    fn registration_policy(&self, _had_effect: bool) -> RegistrationPolicy {
        if self.unlimited {
            RegistrationPolicy::Unlimited
        } else {
            RegistrationPolicy::Limited
        }
    }

    fn as_undoable(&mut self) -> Option<&mut dyn Undoable> {
        Some(self)
    }
}

impl Undoable for Entry {
    fn undo(&mut self) -> Result<(), CommandError> {
        Ok(())
    }

    fn redo(&mut self) -> Result<(), CommandError> {
        Ok(())
    }
}

fn entry(unlimited: bool) -> SharedCommand {
    Cmd::new(Entry { unlimited }).into_shared()
}

fn status(command: &SharedCommand) -> CommandStatus {
    command.lock().unwrap().status()
}

#[derive(Clone, Debug)]
enum Op {
    Add,
    Undo,
    Redo,
}

prop_compose! {
    fn arbitrary_op()(variant in 0..3u8) -> Op {
        match variant {
            0 => Op::Add,
            1 => Op::Undo,
            _ => Op::Redo,
        }
    }
}

type ByteEdge = EventEdge<u8, Vec<usize>>;

/// Machine with one `init -> s<i>` edge per threshold, each accepting
/// bytes at or above its threshold and recording its index.
fn fan_out(thresholds: &[u8]) -> Fsm<u8, Vec<usize>> {
    let mut builder = FsmBuilder::new().terminal_state("end");
    for (i, &threshold) in thresholds.iter().enumerate() {
        let name = format!("s{i}");
        builder = builder
            .std_state(name.clone())
            .on(
                "init",
                name.clone(),
                ByteEdge::on("byte", move |e| *e >= threshold)
                    .action(move |_, fired| fired.push(i)),
            )
            .on(name, "end", ByteEdge::on("byte", |_| true));
    }
    builder.build().unwrap()
}

#[derive(Clone, Debug, PartialEq)]
enum Pointer {
    Down,
    Move(i32),
    Up,
}

type PointerEdge = EventEdge<Pointer, Vec<i32>>;

fn drag() -> Fsm<Pointer, Vec<i32>> {
    FsmBuilder::new()
        .std_state("dragging")
        .terminal_state("dropped")
        .on("init", "dragging", PointerEdge::on("down", |e| *e == Pointer::Down))
        .on(
            "dragging",
            "dragging",
            PointerEdge::on("move", |e| matches!(e, Pointer::Move(_))).action(|e, path| {
                if let Pointer::Move(x) = e {
                    path.push(*x);
                }
            }),
        )
        .on("dragging", "dropped", PointerEdge::on("up", |e| *e == Pointer::Up))
        .build()
        .unwrap()
}

/// Keeps the path seen when the drag stops.
struct Dropped(Rc<RefCell<Option<Vec<i32>>>>);

impl FsmHandler<Vec<i32>> for Dropped {
    fn on_stop(&mut self, path: &Vec<i32>) -> Result<(), CancelFsm> {
        *self.0.borrow_mut() = Some(path.clone());
        Ok(())
    }
}

proptest! {
    #[test]
    fn first_matching_transition_wins(
        thresholds in prop::collection::vec(any::<u8>(), 1..6),
        event in any::<u8>(),
    ) {
        let mut fsm = fan_out(&thresholds);
        let mut fired = Vec::new();

        let processed = fsm.process(event, &mut fired);

        let expected = thresholds.iter().position(|&t| event >= t);
        prop_assert_eq!(processed, expected.is_some());
        prop_assert_eq!(fired, expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn registry_never_evicts_unlimited_commands(
        capacity in 1..6usize,
        policies in prop::collection::vec(any::<bool>(), 0..20),
    ) {
        let registry = CommandRegistry::with_capacity(capacity);
        let mut added = Vec::new();
        let mut model: Vec<usize> = Vec::new();

        for (i, &unlimited) in policies.iter().enumerate() {
            let command = entry(unlimited);
            prop_assert!(registry.add(command.clone()));
            added.push(command);

            if model.len() >= capacity {
                if let Some(index) = model.iter().position(|&m| !policies[m]) {
                    model.remove(index);
                }
            }
            model.push(i);
        }

        let registered = registry.commands();
        prop_assert_eq!(registered.len(), model.len());
        for (command, &index) in registered.iter().zip(&model) {
            prop_assert!(same_command(command, &added[index]));
        }
        for (i, command) in added.iter().enumerate() {
            if policies[i] {
                prop_assert!(registry.contains(command));
            }
            if !model.contains(&i) {
                prop_assert_eq!(status(command), CommandStatus::Flushed);
            }
        }
    }

    #[test]
    fn undo_and_redo_keep_stack_discipline(
        ops in prop::collection::vec(arbitrary_op(), 0..30),
    ) {
        let collector = UndoCollector::with_capacity(100);
        let mut undo_model: Vec<SharedCommand> = Vec::new();
        let mut redo_model: Vec<SharedCommand> = Vec::new();

        for op in ops {
            match op {
                Op::Add => {
                    let command = entry(false);
                    prop_assert!(collector.add(command.clone()));
                    undo_model.push(command);
                    redo_model.clear();
                }
                Op::Undo => {
                    let moved = collector.undo().unwrap();
                    prop_assert_eq!(moved, !undo_model.is_empty());
                    if let Some(command) = undo_model.pop() {
                        redo_model.push(command);
                    }
                }
                Op::Redo => {
                    let moved = collector.redo().unwrap();
                    prop_assert_eq!(moved, !redo_model.is_empty());
                    if let Some(command) = redo_model.pop() {
                        undo_model.push(command);
                    }
                }
            }

            prop_assert_eq!(collector.undo_len(), undo_model.len());
            prop_assert_eq!(collector.redo_len(), redo_model.len());
            match (collector.last_undo(), undo_model.last()) {
                (Some(top), Some(expected)) => prop_assert!(same_command(&top, expected)),
                (None, None) => {}
                _ => prop_assert!(false, "undo top mismatch"),
            }
        }
    }

    #[test]
    fn throttled_burst_dispatches_first_and_last_only(
        burst in prop::collection::vec(any::<i32>(), 1..15),
    ) {
        let stopped = Rc::new(RefCell::new(None));
        let mut interaction = Interaction::new(drag());
        interaction.set_throttle_timeout(60_000);
        interaction
            .machine_mut()
            .add_handler(Box::new(Dropped(stopped.clone())));

        interaction.process_event(Pointer::Down);
        for &x in &burst {
            interaction.process_event(Pointer::Move(x));
        }
        interaction.process_event(Pointer::Up);
        interaction.uninstall();

        let mut expected = vec![burst[0]];
        if burst.len() > 1 {
            expected.push(burst[burst.len() - 1]);
        }
        prop_assert_eq!(stopped.borrow().clone(), Some(expected));
    }
}
