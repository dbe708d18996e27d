//! Concurrent combination of machines.

use crate::builder::ConfigError;
use crate::fsm::handler::{CancelFsm, FsmHandler, HandlerId, Outcome, Recorder};
use crate::fsm::{Fsm, Machine};
use crate::interaction::OwnerWaker;
use std::sync::Arc;
use tracing::debug;

/// Machines fed the same events and observed as a single interaction.
///
/// The combination starts when its first member starts; every later member
/// start or update is an update. It ends once no started member is still
/// running: with a cancel if at least one member cancelled, with a stop
/// otherwise. Members that never started are left untouched.
///
/// Typical use is multi-touch, one member per finger.
pub struct ConcurrentFsm<E, D> {
    members: Vec<Fsm<E, D>>,
    running: Vec<bool>,
    participated: Vec<bool>,
    started: bool,
    cancelled: bool,
    inner: bool,
    handlers: Vec<(HandlerId, Box<dyn FsmHandler<D>>)>,
}

impl<E: Clone + 'static, D: Default + 'static> ConcurrentFsm<E, D> {
    /// Combine at least two machines.
    pub fn new(members: Vec<Fsm<E, D>>) -> Result<Self, ConfigError> {
        if members.len() < 2 {
            return Err(ConfigError::TooFewMembers {
                count: members.len(),
            });
        }
        let mut members = members;
        for member in &mut members {
            member.set_inner(true);
        }
        let count = members.len();
        Ok(Self {
            members,
            running: vec![false; count],
            participated: vec![false; count],
            started: false,
            cancelled: false,
            inner: false,
            handlers: Vec::new(),
        })
    }

    /// Member machines, in registration order.
    pub fn members(&self) -> &[Fsm<E, D>] {
        &self.members
    }

    /// Number of members currently running.
    pub fn running_members(&self) -> usize {
        self.running.iter().filter(|r| **r).count()
    }

    fn settle(
        &mut self,
        outcomes: Vec<(usize, Vec<Outcome>)>,
        data: &mut D,
        driver: &mut dyn FsmHandler<D>,
    ) {
        for (member, list) in outcomes {
            for outcome in list {
                let settled = match outcome {
                    Outcome::Started => {
                        self.running[member] = true;
                        self.participated[member] = true;
                        if self.started {
                            self.notify_update(data, driver)
                        } else {
                            self.started = true;
                            debug!(member, "concurrent machine started");
                            self.notify_start(data, driver)
                        }
                    }
                    Outcome::Updated if self.started => self.notify_update(data, driver),
                    Outcome::Updated => Ok(()),
                    Outcome::Stopped => {
                        self.running[member] = false;
                        self.finish_if_idle(data, driver)
                    }
                    Outcome::Cancelled => {
                        self.running[member] = false;
                        self.cancelled = true;
                        self.finish_if_idle(data, driver)
                    }
                };
                if settled.is_err() {
                    self.cancel_run(data, driver);
                    return;
                }
            }
        }
    }

    fn finish_if_idle(&mut self, data: &mut D, driver: &mut dyn FsmHandler<D>) -> Result<(), CancelFsm> {
        if !self.started || self.running.iter().any(|r| *r) {
            return Ok(());
        }
        if self.cancelled {
            debug!("concurrent machine cancelled");
            self.notify_cancel(data, driver);
        } else {
            debug!("concurrent machine stopped");
            self.notify_stop(data, driver)?;
        }
        self.end_run(data);
        Ok(())
    }

    /// Cancel the combination after a handler asked for it.
    fn cancel_run(&mut self, data: &mut D, driver: &mut dyn FsmHandler<D>) {
        if self.started {
            debug!("concurrent machine cancelled by a handler");
            self.notify_cancel(data, driver);
        }
        for (member, fsm) in self.members.iter_mut().enumerate() {
            if self.participated[member] {
                fsm.full_reinit(data);
            }
        }
        self.end_run(data);
    }

    fn end_run(&mut self, data: &mut D) {
        self.started = false;
        self.cancelled = false;
        self.running.iter_mut().for_each(|r| *r = false);
        self.participated.iter_mut().for_each(|p| *p = false);
        if !self.inner {
            *data = D::default();
        }
    }

    fn notify_start(&mut self, data: &D, driver: &mut dyn FsmHandler<D>) -> Result<(), CancelFsm> {
        driver.on_start(data)?;
        self.handlers
            .iter_mut()
            .try_for_each(|(_, handler)| handler.on_start(data))
    }

    fn notify_update(&mut self, data: &D, driver: &mut dyn FsmHandler<D>) -> Result<(), CancelFsm> {
        driver.on_update(data)?;
        self.handlers
            .iter_mut()
            .try_for_each(|(_, handler)| handler.on_update(data))
    }

    fn notify_stop(&mut self, data: &D, driver: &mut dyn FsmHandler<D>) -> Result<(), CancelFsm> {
        driver.on_stop(data)?;
        self.handlers
            .iter_mut()
            .try_for_each(|(_, handler)| handler.on_stop(data))
    }

    fn notify_cancel(&mut self, data: &D, driver: &mut dyn FsmHandler<D>) {
        driver.on_cancel(data);
        for (_, handler) in &mut self.handlers {
            handler.on_cancel(data);
        }
    }
}

impl<E: Clone + 'static, D: Default + 'static> Machine<E, D> for ConcurrentFsm<E, D> {
    fn process_with(&mut self, event: E, data: &mut D, driver: &mut dyn FsmHandler<D>) -> bool {
        let mut fired = false;
        let mut outcomes = Vec::with_capacity(self.members.len());
        for (member, fsm) in self.members.iter_mut().enumerate() {
            let mut recorder = Recorder::default();
            fired |= fsm.process_with(event.clone(), data, &mut recorder);
            outcomes.push((member, recorder.outcomes));
        }
        self.settle(outcomes, data, driver);
        fired
    }

    fn pump_with(&mut self, data: &mut D, driver: &mut dyn FsmHandler<D>) -> bool {
        let mut fired = false;
        let mut outcomes = Vec::with_capacity(self.members.len());
        for (member, fsm) in self.members.iter_mut().enumerate() {
            let mut recorder = Recorder::default();
            fired |= fsm.pump_with(data, &mut recorder);
            outcomes.push((member, recorder.outcomes));
        }
        self.settle(outcomes, data, driver);
        fired
    }

    fn reinit(&mut self, data: &mut D) {
        for fsm in &mut self.members {
            fsm.reinit(data);
        }
        self.end_run(data);
    }

    fn full_reinit(&mut self, data: &mut D) {
        for fsm in &mut self.members {
            fsm.full_reinit(data);
        }
        self.end_run(data);
    }

    fn uninstall(&mut self) {
        for fsm in &mut self.members {
            fsm.uninstall();
        }
        self.handlers.clear();
        self.started = false;
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn is_at_init(&self) -> bool {
        self.members.iter().all(|fsm| fsm.is_at_init())
    }

    fn current_state_name(&self) -> &str {
        self.members
            .iter()
            .zip(&self.running)
            .find(|(_, running)| **running)
            .map_or("init", |(fsm, _)| fsm.current_state_name())
    }

    fn accepted_kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        for fsm in &self.members {
            for kind in fsm.accepted_kinds() {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }

    fn set_owner_waker(&mut self, waker: Arc<dyn OwnerWaker>) {
        for fsm in &mut self.members {
            fsm.set_owner_waker(waker.clone());
        }
    }

    fn set_inner(&mut self, inner: bool) {
        self.inner = inner;
    }

    fn is_inner(&self) -> bool {
        self.inner
    }

    fn add_handler(&mut self, handler: Box<dyn FsmHandler<D>>) -> HandlerId {
        let id = HandlerId::new();
        self.handlers.push((id, handler));
        id
    }

    fn remove_handler(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }
}

impl<E, D> std::fmt::Debug for ConcurrentFsm<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentFsm")
            .field("members", &self.members)
            .field("running", &self.running)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EventEdge, FsmBuilder};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Debug, PartialEq)]
    enum Touch {
        Down(u8),
        Up(u8),
        Lost(u8),
    }

    type Edge = EventEdge<Touch, Vec<u8>>;
    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn finger(id: u8) -> Fsm<Touch, Vec<u8>> {
        FsmBuilder::new()
            .std_state("touched")
            .terminal_state("released")
            .cancelling_state("lost")
            .on(
                "init",
                "touched",
                Edge::on("down", move |t| *t == Touch::Down(id)).action(move |_, fingers| fingers.push(id)),
            )
            .on("touched", "released", Edge::on("up", move |t| *t == Touch::Up(id)))
            .on("touched", "lost", Edge::on("lost", move |t| *t == Touch::Lost(id)))
            .build()
            .unwrap()
    }

    struct Spy {
        log: Log,
        cancel_on_update: bool,
    }

    impl FsmHandler<Vec<u8>> for Spy {
        fn on_start(&mut self, _data: &Vec<u8>) -> Result<(), CancelFsm> {
            self.log.borrow_mut().push("start");
            Ok(())
        }

        fn on_update(&mut self, _data: &Vec<u8>) -> Result<(), CancelFsm> {
            self.log.borrow_mut().push("update");
            if self.cancel_on_update {
                return Err(CancelFsm);
            }
            Ok(())
        }

        fn on_stop(&mut self, _data: &Vec<u8>) -> Result<(), CancelFsm> {
            self.log.borrow_mut().push("stop");
            Ok(())
        }

        fn on_cancel(&mut self, _data: &Vec<u8>) {
            self.log.borrow_mut().push("cancel");
        }
    }

    fn two_fingers(cancel_on_update: bool) -> (ConcurrentFsm<Touch, Vec<u8>>, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut fsm = ConcurrentFsm::new(vec![finger(1), finger(2)]).unwrap();
        fsm.add_handler(Box::new(Spy {
            log: log.clone(),
            cancel_on_update,
        }));
        (fsm, log)
    }

    #[test]
    fn needs_two_members() {
        let result = ConcurrentFsm::new(vec![finger(1)]);
        assert!(matches!(result, Err(ConfigError::TooFewMembers { count: 1 })));
    }

    #[test]
    fn members_become_inner() {
        let (fsm, _) = two_fingers(false);
        assert!(fsm.members().iter().all(|m| m.is_inner()));
    }

    #[test]
    fn starts_on_first_member_and_stops_when_all_done() {
        let (mut fsm, log) = two_fingers(false);
        let mut fingers = Vec::new();

        fsm.process(Touch::Down(1), &mut fingers);
        fsm.process(Touch::Down(2), &mut fingers);
        assert_eq!(fsm.running_members(), 2);
        assert_eq!(fingers, vec![1, 2]);

        fsm.process(Touch::Up(1), &mut fingers);
        assert!(fsm.is_started());
        fsm.process(Touch::Up(2), &mut fingers);

        // Down(1): start + update; Down(2): start-as-update + update
        assert_eq!(*log.borrow(), vec!["start", "update", "update", "update", "stop"]);
        assert!(!fsm.is_started());
        assert!(fsm.is_at_init());
        assert!(fingers.is_empty());
    }

    #[test]
    fn one_cancelled_member_cancels_the_whole() {
        let (mut fsm, log) = two_fingers(false);
        let mut fingers = Vec::new();

        fsm.process(Touch::Down(1), &mut fingers);
        fsm.process(Touch::Down(2), &mut fingers);
        fsm.process(Touch::Lost(2), &mut fingers);
        assert!(fsm.is_started());
        fsm.process(Touch::Up(1), &mut fingers);

        assert_eq!(log.borrow().last(), Some(&"cancel"));
        assert!(!log.borrow().contains(&"stop"));
    }

    #[test]
    fn members_that_never_started_are_untouched() {
        let (mut fsm, log) = two_fingers(false);
        let mut fingers = Vec::new();

        fsm.process(Touch::Down(1), &mut fingers);
        fsm.process(Touch::Up(1), &mut fingers);

        assert_eq!(*log.borrow(), vec!["start", "update", "stop"]);
        assert!(fsm.members()[1].is_at_init());
    }

    #[test]
    fn handler_cancel_reinitialises_started_members() {
        let (mut fsm, log) = two_fingers(true);
        let mut fingers = Vec::new();

        fsm.process(Touch::Down(1), &mut fingers);

        assert_eq!(*log.borrow(), vec!["start", "update", "cancel"]);
        assert!(fsm.is_at_init());
        assert!(!fsm.is_started());
    }

    #[test]
    fn accepted_kinds_union_members() {
        let (mut fsm, _) = two_fingers(false);
        assert_eq!(fsm.accepted_kinds(), vec!["down"]);

        fsm.process(Touch::Down(1), &mut Vec::new());
        assert_eq!(fsm.accepted_kinds(), vec!["up", "lost", "down"]);
        assert_eq!(fsm.current_state_name(), "touched");
    }
}
