//! Builder API for interaction machines.
//!
//! This module provides the fluent [`FsmBuilder`] and the edge builders
//! used to describe transitions. Graphs are checked when built: every
//! problem found is reported in one [`ConfigErrors`] value.

mod error;
mod machine;
mod transition;
mod validate;

pub use error::{ConfigError, ConfigErrors};
pub use machine::FsmBuilder;
pub use transition::{EventEdge, NarrowEdge, SubEdge, TimeoutEdge};

use crate::fsm::Fsm;

/// Machine recognising a single event: `init` to a terminal `done` state.
///
/// Useful for one-shot interactions such as a button press.
///
/// # Example
///
/// ```
/// use actuate::builder::single_event;
/// use actuate::fsm::Machine;
///
/// let mut fsm = single_event::<char, (), _>("key", |c| c.is_ascii_digit());
///
/// assert!(!fsm.process('x', &mut ()));
/// assert!(fsm.process('7', &mut ()));
/// assert!(fsm.is_at_init());
/// ```
pub fn single_event<E, D, F>(kind: &'static str, accept: F) -> Fsm<E, D>
where
    E: Clone + 'static,
    D: Default + 'static,
    F: Fn(&E) -> bool + 'static,
{
    let built = FsmBuilder::new()
        .terminal_state("done")
        .on("init", "done", EventEdge::on(kind, accept))
        .build();
    match built {
        Ok(fsm) => fsm,
        // init -> done with one kind is always well formed
        Err(errors) => unreachable!("single event machine rejected: {errors}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::{CancelFsm, FsmHandler, Machine};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter(Rc<Cell<u32>>);

    impl FsmHandler<()> for Counter {
        fn on_stop(&mut self, _data: &()) -> Result<(), CancelFsm> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn single_event_machine_starts_and_stops_on_one_event() {
        let stops = Rc::new(Cell::new(0));
        let mut fsm = single_event::<u8, (), _>("byte", |b| *b > 10);
        fsm.add_handler(Box::new(Counter(stops.clone())));

        assert!(!fsm.process(3, &mut ()));
        assert!(fsm.process(30, &mut ()));
        assert!(fsm.process(40, &mut ()));

        assert_eq!(stops.get(), 2);
        assert_eq!(fsm.accepted_kinds(), vec!["byte"]);
    }
}
