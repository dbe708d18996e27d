//! Guard predicates for controlling transitions.
//!
//! Guards are boolean functions evaluated after a transition accepted an
//! event. They read the event and the interaction data gathered so far, and
//! must not have side effects: a guard returning `false` silently skips the
//! transition.

/// Predicate that decides if an accepted event may fire a transition.
///
/// # Example
///
/// ```rust
/// use actuate::core::Guard;
///
/// #[derive(Default)]
/// struct Presses {
///     count: usize,
/// }
///
/// // Only the second press fires
/// let second_press = Guard::new(|button: &u8, data: &Presses| *button == 1 && data.count == 1);
///
/// assert!(second_press.check(&1, &Presses { count: 1 }));
/// assert!(!second_press.check(&1, &Presses { count: 0 }));
/// assert!(!second_press.check(&2, &Presses { count: 1 }));
/// ```
pub struct Guard<E, D> {
    predicate: Box<dyn Fn(&E, &D) -> bool>,
}

impl<E, D> Guard<E, D> {
    /// Create a guard from a predicate over the event and interaction data.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&E, &D) -> bool + 'static,
    {
        Guard {
            predicate: Box::new(predicate),
        }
    }

    /// Check if the guard allows the transition for this event.
    pub fn check(&self, event: &E, data: &D) -> bool {
        (self.predicate)(event, data)
    }
}

impl<E, D> std::fmt::Debug for Guard<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum Ev {
        Press(u8),
        Release(u8),
    }

    #[derive(Default)]
    struct Data {
        pressed: Option<u8>,
    }

    #[test]
    fn guard_allows_matching_events() {
        let guard = Guard::new(|e: &Ev, _: &Data| matches!(e, Ev::Press(1)));

        assert!(guard.check(&Ev::Press(1), &Data::default()));
        assert!(!guard.check(&Ev::Press(2), &Data::default()));
    }

    #[test]
    fn guard_reads_interaction_data() {
        let same_button = Guard::new(|e: &Ev, d: &Data| match e {
            Ev::Release(b) => d.pressed == Some(*b),
            Ev::Press(_) => false,
        });

        let data = Data { pressed: Some(3) };
        assert!(same_button.check(&Ev::Release(3), &data));
        assert!(!same_button.check(&Ev::Release(1), &data));
        assert!(!same_button.check(&Ev::Release(3), &Data::default()));
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = Guard::new(|e: &Ev, _: &Data| matches!(e, Ev::Release(_)));
        let event = Ev::Release(0);
        let data = Data::default();

        assert_eq!(guard.check(&event, &data), guard.check(&event, &data));
    }
}
