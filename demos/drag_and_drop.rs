//! Drag and Drop
//!
//! This example moves a shape with a press-drag-release interaction.
//!
//! Key concepts:
//! - Building a validated interaction machine
//! - Continuous execution: the shape follows the pointer while dragging
//! - Cancelling a drag undoes the move
//! - Finished drags land in the registry and can be undone
//!
//! Run with: RUST_LOG=actuate=debug cargo run --example drag_and_drop

use actuate::binding::BindingBuilder;
use actuate::builder::{EventEdge, FsmBuilder};
use actuate::command::{CommandBody, CommandRegistry, Undoable};
use actuate::config::Settings;
use actuate::error::{CommandError, ErrorCatcher};
use actuate::fsm::Machine;
use actuate::interaction::Interaction;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, PartialEq)]
enum Pointer {
    Press(i32, i32),
    Move(i32, i32),
    Release,
    Escape,
}

/// Pointer positions collected by the drag.
#[derive(Default, Debug)]
struct Drag {
    from: Option<(i32, i32)>,
    to: Option<(i32, i32)>,
}

type Edge = EventEdge<Pointer, Drag>;

type Shape = Arc<Mutex<(i32, i32)>>;

/// Moves a shape to a new position.
struct MoveShape {
    shape: Shape,
    before: (i32, i32),
    target: (i32, i32),
}

impl CommandBody for MoveShape {
    fn name(&self) -> &str {
        "move shape"
    }

    fn create_memento(&mut self) {
        self.before = *self.shape.lock().unwrap();
    }

    fn execute(&mut self) -> Result<(), CommandError> {
        *self.shape.lock().unwrap() = self.target;
        Ok(())
    }

    fn as_undoable(&mut self) -> Option<&mut dyn Undoable> {
        Some(self)
    }
}

impl Undoable for MoveShape {
    fn undo(&mut self) -> Result<(), CommandError> {
        *self.shape.lock().unwrap() = self.before;
        Ok(())
    }

    fn redo(&mut self) -> Result<(), CommandError> {
        *self.shape.lock().unwrap() = self.target;
        Ok(())
    }

    fn undo_name(&self) -> Option<String> {
        Some(format!("move to {:?}", self.target))
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Drag and Drop ===\n");

    let drag = FsmBuilder::new()
        .std_state("pressed")
        .std_state("dragged")
        .terminal_state("dropped")
        .cancelling_state("cancelled")
        .on(
            "init",
            "pressed",
            Edge::on("press", |e| matches!(e, Pointer::Press(..))).action(|e, drag| {
                if let Pointer::Press(x, y) = e {
                    drag.from = Some((*x, *y));
                }
            }),
        )
        .on(
            "pressed",
            "dragged",
            Edge::on("move", |e| matches!(e, Pointer::Move(..))).action(follow),
        )
        .on(
            "dragged",
            "dragged",
            Edge::on("move", |e| matches!(e, Pointer::Move(..))).action(follow),
        )
        .on("dragged", "dropped", Edge::on("release", |e| *e == Pointer::Release))
        .on("pressed", "cancelled", Edge::on("escape", |e| *e == Pointer::Escape))
        .on("dragged", "cancelled", Edge::on("escape", |e| *e == Pointer::Escape))
        .build()
        .unwrap();

    let settings =
        Settings::from_json_str(r#"{ "continuous_execution": true, "undo_capacity": 10 }"#).unwrap();
    let registry = Arc::new(CommandRegistry::new());
    settings.apply_to_registry(&registry);
    let errors = Arc::new(ErrorCatcher::new());

    let shape: Shape = Arc::new(Mutex::new((0, 0)));
    let target = shape.clone();
    let mut binding = BindingBuilder::new(Interaction::new(drag))
        .producer(move |_: &Drag| {
            Ok(MoveShape {
                shape: target.clone(),
                before: (0, 0),
                target: (0, 0),
            })
        })
        .when(|drag| drag.to.is_some() && drag.to != drag.from)
        .then(|cmd, drag| {
            if let Some(to) = drag.to {
                cmd.target = to;
            }
        })
        .settings(&settings)
        .registry(registry.clone())
        .errors(errors)
        .build()
        .unwrap();

    println!("Shape starts at {:?}", *shape.lock().unwrap());

    for event in [
        Pointer::Press(0, 0),
        Pointer::Move(5, 5),
        Pointer::Move(10, 20),
        Pointer::Release,
    ] {
        binding.process_event(event).unwrap();
        println!(
            "  state {:<8} shape {:?}",
            binding.interaction().machine().current_state_name(),
            *shape.lock().unwrap()
        );
    }

    println!("\nA second drag, cancelled with Escape:");
    for event in [Pointer::Press(10, 20), Pointer::Move(40, 40), Pointer::Escape] {
        binding.process_event(event).unwrap();
        println!("  shape {:?}", *shape.lock().unwrap());
    }

    let history = registry.undo_collector();
    println!(
        "\nDrags ended: {}, cancelled: {}",
        binding.times_ended(),
        binding.times_cancelled()
    );
    println!("Undo available: {:?}", history.last_undo_message());

    history.undo().unwrap();
    println!("After undo: {:?}", *shape.lock().unwrap());
    history.redo().unwrap();
    println!("After redo: {:?}", *shape.lock().unwrap());

    binding.uninstall();
    println!("\n=== Example Complete ===");
}

fn follow(e: &Pointer, drag: &mut Drag) {
    if let Pointer::Move(x, y) = e {
        drag.to = Some((*x, *y));
    }
}
