//! Transition builders.
//!
//! Three kinds of edges connect states:
//! - [`EventEdge`]: fired by an input event that passes `accept` and the
//!   optional guard
//! - [`TimeoutEdge`]: fired when its delay elapses with no competing
//!   transition out of its source
//! - [`SubEdge`]: delegates events to an embedded machine until it ends

use crate::core::Guard;
use crate::fsm::Fsm;
use std::rc::Rc;

type Accept<E> = Box<dyn Fn(&E) -> bool>;
type Action<E, D> = Box<dyn Fn(&E, &mut D)>;
type Projection<E, T> = Rc<dyn for<'a> Fn(&'a E) -> Option<&'a T>>;

/// Transition fired by an input event.
///
/// # Example
///
/// ```rust
/// use actuate::builder::EventEdge;
///
/// #[derive(Clone)]
/// enum Mouse {
///     Press { x: i32 },
///     Release { x: i32 },
/// }
///
/// #[derive(Default)]
/// struct Drag {
///     origin: i32,
/// }
///
/// let press = EventEdge::<Mouse, Drag>::on("press", |e| matches!(e, Mouse::Press { .. }))
///     .action(|e, data| {
///         if let Mouse::Press { x } = e {
///             data.origin = *x;
///         }
///     });
///
/// assert_eq!(press.kinds(), ["press"]);
/// ```
pub struct EventEdge<E, D> {
    pub(crate) kinds: Vec<&'static str>,
    pub(crate) accept: Accept<E>,
    pub(crate) guard: Option<Guard<E, D>>,
    pub(crate) action: Option<Action<E, D>>,
    pub(crate) recycle: bool,
}

impl<E: 'static, D: 'static> EventEdge<E, D> {
    /// Edge reacting to one event kind.
    pub fn on<F>(kind: &'static str, accept: F) -> Self
    where
        F: Fn(&E) -> bool + 'static,
    {
        Self::on_any(&[kind], accept)
    }

    /// Edge reacting to several event kinds.
    pub fn on_any<F>(kinds: &[&'static str], accept: F) -> Self
    where
        F: Fn(&E) -> bool + 'static,
    {
        Self {
            kinds: kinds.to_vec(),
            accept: Box::new(accept),
            guard: None,
            action: None,
            recycle: false,
        }
    }

    /// Edge that accepts events projecting to a `T`, with guard and action
    /// working on the projected value.
    ///
    /// ```rust
    /// use actuate::builder::EventEdge;
    ///
    /// struct Key(char);
    ///
    /// enum Input {
    ///     Key(Key),
    ///     Scroll(i32),
    /// }
    ///
    /// let typed: EventEdge<Input, String> = EventEdge::<Input, String>::narrow("key", |e: &Input| match e {
    ///     Input::Key(key) => Some(key),
    ///     Input::Scroll(_) => None,
    /// })
    /// .when(|key, _| key.0.is_alphanumeric())
    /// .action(|key, text| text.push(key.0))
    /// .into();
    /// ```
    pub fn narrow<T, P>(kind: &'static str, project: P) -> NarrowEdge<E, D, T>
    where
        T: 'static,
        P: for<'a> Fn(&'a E) -> Option<&'a T> + 'static,
    {
        NarrowEdge {
            kinds: vec![kind],
            project: Rc::new(project),
            guard: None,
            action: None,
            recycle: false,
        }
    }

    /// Only fire when `guard` holds for the event and the data so far.
    pub fn when<F>(mut self, guard: F) -> Self
    where
        F: Fn(&E, &D) -> bool + 'static,
    {
        self.guard = Some(Guard::new(guard));
        self
    }

    /// Run `action` when the edge fires, before the target is entered.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&E, &mut D) + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }

    /// Queue the firing event for replay once the run terminates.
    ///
    /// Used for events that outlive the interaction they took part in, such
    /// as a modifier key still held down.
    pub fn recycle(mut self) -> Self {
        self.recycle = true;
        self
    }

    /// Event kinds this edge reacts to.
    pub fn kinds(&self) -> &[&'static str] {
        &self.kinds
    }

    pub(crate) fn accepts(&self, event: &E, data: &D) -> bool {
        (self.accept)(event) && self.guard.as_ref().map_or(true, |g| g.check(event, data))
    }
}

impl<E, D> std::fmt::Debug for EventEdge<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEdge")
            .field("kinds", &self.kinds)
            .field("guarded", &self.guard.is_some())
            .field("recycle", &self.recycle)
            .finish()
    }
}

/// Event edge whose guard and action see a projection of the event.
pub struct NarrowEdge<E, D, T> {
    kinds: Vec<&'static str>,
    project: Projection<E, T>,
    guard: Option<Box<dyn Fn(&T, &D) -> bool>>,
    action: Option<Box<dyn Fn(&T, &mut D)>>,
    recycle: bool,
}

impl<E: 'static, D: 'static, T: 'static> NarrowEdge<E, D, T> {
    /// Only fire when `guard` holds for the projected event.
    pub fn when<F>(mut self, guard: F) -> Self
    where
        F: Fn(&T, &D) -> bool + 'static,
    {
        self.guard = Some(Box::new(guard));
        self
    }

    /// Run `action` on the projected event when the edge fires.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&T, &mut D) + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }

    /// Queue the firing event for replay once the run terminates.
    pub fn recycle(mut self) -> Self {
        self.recycle = true;
        self
    }
}

impl<E: 'static, D: 'static, T: 'static> From<NarrowEdge<E, D, T>> for EventEdge<E, D> {
    fn from(edge: NarrowEdge<E, D, T>) -> Self {
        let project = edge.project;

        let accept = {
            let project = project.clone();
            Box::new(move |e: &E| project(e).is_some()) as Accept<E>
        };

        let guard = edge.guard.map(|guard| {
            let project = project.clone();
            Guard::new(move |e: &E, d: &D| project(e).map_or(false, |t| guard(t, d)))
        });

        let action = edge.action.map(|action| {
            Box::new(move |e: &E, d: &mut D| {
                if let Some(t) = project(e) {
                    action(t, d);
                }
            }) as Action<E, D>
        });

        EventEdge {
            kinds: edge.kinds,
            accept,
            guard,
            action,
            recycle: edge.recycle,
        }
    }
}

/// Transition fired when a delay elapses.
///
/// The delay supplier is evaluated each time the source state is entered.
/// A delay of zero fires the transition as soon as the source is entered.
pub struct TimeoutEdge<D> {
    pub(crate) millis: Box<dyn Fn() -> u64>,
    pub(crate) action: Option<Box<dyn Fn(&mut D)>>,
}

impl<D: 'static> TimeoutEdge<D> {
    /// Timeout whose delay is computed on every arm.
    pub fn after<F>(millis: F) -> Self
    where
        F: Fn() -> u64 + 'static,
    {
        Self {
            millis: Box::new(millis),
            action: None,
        }
    }

    /// Timeout with a fixed delay.
    pub fn millis(millis: u64) -> Self {
        Self::after(move || millis)
    }

    /// Run `action` when the timeout fires.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut D) + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }
}

/// Transition that runs an embedded machine.
///
/// The edge is taken when a transition out of the embedded machine's init
/// state accepts the event. The outer machine then forwards every event to
/// the embedded one until it stops (the outer machine enters the edge
/// target) or cancels (the outer machine cancels).
pub struct SubEdge<E, D> {
    pub(crate) machine: Fsm<E, D>,
    pub(crate) action: Option<Box<dyn Fn(&mut D)>>,
}

impl<E: Clone + 'static, D: Default + 'static> SubEdge<E, D> {
    pub fn new(machine: Fsm<E, D>) -> Self {
        Self {
            machine,
            action: None,
        }
    }

    /// Run `action` when the embedded machine stops, before the target is
    /// entered.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut D) + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }
}

impl<E: Clone + 'static, D: Default + 'static> From<Fsm<E, D>> for SubEdge<E, D> {
    fn from(machine: Fsm<E, D>) -> Self {
        SubEdge::new(machine)
    }
}
