//! The join primitive: a group of slots which resolves once all of them are
//! filled, or as soon as one of them fails.
//!
//! A group reserves slots synchronously, while its body runs, and fills them
//! later, in any order, from error-first callbacks. Once every reserved slot
//! is filled the group is *fulfilled* with the slot values in reservation
//! order. The first error *rejects* the group instead; whatever arrives after
//! that is ignored.
//!
//! Continuations attached with [`Group::then`] and friends run on a later tick
//! of the [`EventLoop`], each inside a fresh child group. That child is what
//! `then` returns, which is how chains are built:
//!
//! ```rust
//! use flowy::{EventLoop, Group, Value};
//!
//! let ev = EventLoop::new();
//! let out = Group::<Value>::chain(&ev, |group| {
//!     let slot = group.slot();
//!     group.event_loop().defer(move || slot.ok("async".into()));
//!     group.pass(["sync".into()]);
//!     Ok(())
//! })
//! .then_ok(|group, values| {
//!     let text: Vec<&str> = values.iter().filter_map(|v| v.as_str()).collect();
//!     let joined = text.join("+");
//!     group.pass([joined.into()]);
//!     Ok(())
//! });
//!
//! ev.run();
//! assert_eq!(out.outcome(), Some(Ok(vec!["async+sync".into()])));
//! ```

mod filler;
mod settled;

pub use filler::Filler;
pub use settled::Settled;

use core::future::IntoFuture;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::utils::SlotVec;
use crate::{Error, EventLoop, Outcome, SharedContext, SlotValue, Value};

use filler::SlotKind;

/// A continuation waiting for a group to resolve.
type Reaction<T> = Box<dyn FnOnce(Outcome<T>)>;

/// The resolution state of a [`Group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupState {
    /// Slots are still pending and no explicit resolution happened yet.
    Unresolved,
    /// Every slot was filled, or the group was resolved with values.
    Fulfilled,
    /// A slot failed, a body returned an error, or the group was rejected.
    Rejected,
}

/// Internal state machine. `Settled` is terminal.
enum State<T> {
    Unresolved {
        slots: SlotVec<T>,
        queue: VecDeque<Reaction<T>>,
    },
    Settled(Outcome<T>),
}

struct Inner<T> {
    event_loop: EventLoop,
    context: SharedContext,
    state: RefCell<State<T>>,
}

/// A set of concurrently filled slots which resolves as a single unit.
///
/// `Group` is a handle: cloning it is cheap and every clone refers to the same
/// group. See the [module documentation](self) for an overview.
pub struct Group<T = Value> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Group<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Group<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (state, len, pending) = match &*self.inner.state.borrow() {
            State::Unresolved { slots, .. } => {
                (GroupState::Unresolved, slots.len(), slots.pending())
            }
            State::Settled(Ok(values)) => (GroupState::Fulfilled, values.len(), 0),
            State::Settled(Err(_)) => (GroupState::Rejected, 0, 0),
        };
        f.debug_struct("Group")
            .field("state", &state)
            .field("len", &len)
            .field("pending", &pending)
            .field("context", &self.inner.context)
            .finish()
    }
}

impl<T: SlotValue> Group<T> {
    /// Create a new, empty group scheduled on `event_loop`.
    pub fn new(event_loop: &EventLoop) -> Self {
        Self::with_context(event_loop, SharedContext::new())
    }

    /// Create a new, empty group carrying a shared context.
    ///
    /// Every group derived from this one through chaining shares the context.
    pub fn with_context(event_loop: &EventLoop, context: SharedContext) -> Self {
        Self {
            inner: Rc::new(Inner {
                event_loop: event_loop.clone(),
                context,
                state: RefCell::new(State::Unresolved {
                    slots: SlotVec::new(),
                    queue: VecDeque::new(),
                }),
            }),
        }
    }

    /// Begin a chain with a body which reserves the first slots.
    pub fn chain<F>(event_loop: &EventLoop, body: F) -> Self
    where
        F: FnOnce(&Group<T>) -> Result<(), Error>,
    {
        let group = Self::new(event_loop);
        group.fcall(body);
        group
    }

    /// Begin a chain with an already known outcome.
    pub fn when(event_loop: &EventLoop, outcome: Outcome<T>) -> Self {
        let group = Self::new(event_loop);
        group.resolve_with(outcome);
        group
    }

    /// The event loop this group is scheduled on.
    pub fn event_loop(&self) -> &EventLoop {
        &self.inner.event_loop
    }

    /// The context shared by every group of this chain.
    pub fn context(&self) -> &SharedContext {
        &self.inner.context
    }

    /// Shortcut for the receiver stored in the shared context.
    pub fn receiver<R: 'static>(&self) -> Option<Rc<R>> {
        self.inner.context.receiver()
    }

    /// The current resolution state.
    pub fn state(&self) -> GroupState {
        match &*self.inner.state.borrow() {
            State::Unresolved { .. } => GroupState::Unresolved,
            State::Settled(Ok(_)) => GroupState::Fulfilled,
            State::Settled(Err(_)) => GroupState::Rejected,
        }
    }

    /// Returns `true` once the group is fulfilled or rejected.
    pub fn is_resolved(&self) -> bool {
        self.state() != GroupState::Unresolved
    }

    /// The outcome of the group, if it is resolved.
    pub fn outcome(&self) -> Option<Outcome<T>> {
        match &*self.inner.state.borrow() {
            State::Unresolved { .. } => None,
            State::Settled(outcome) => Some(outcome.clone()),
        }
    }

    /// The number of slots reserved so far, or the number of values once the
    /// group is fulfilled. Zero once rejected.
    pub fn len(&self) -> usize {
        match &*self.inner.state.borrow() {
            State::Unresolved { slots, .. } => slots.len(),
            State::Settled(Ok(values)) => values.len(),
            State::Settled(Err(_)) => 0,
        }
    }

    /// Returns `true` if the group holds no slot and no value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of reserved slots which are not yet filled.
    pub fn pending(&self) -> usize {
        match &*self.inner.state.borrow() {
            State::Unresolved { slots, .. } => slots.pending(),
            State::Settled(_) => 0,
        }
    }

    /// Reserve a slot for the first value of an error-first callback.
    ///
    /// The slot position is fixed now; the returned [`Filler`] writes it later.
    pub fn slot(&self) -> Filler<T> {
        self.reserve(SlotKind::Single)
    }

    /// Reserve a slot for *all* values of an error-first callback, collapsed
    /// into a single value with `From<Vec<T>>`.
    pub fn multi_slot(&self) -> Filler<T> {
        self.reserve(SlotKind::Multi)
    }

    /// Create a nested group whose values fill one slot of this group.
    ///
    /// The nested group shares this group's context. If it is rejected, this
    /// group is rejected with the same error.
    pub fn subgroup(&self) -> Group<T> {
        let filler = self.multi_slot();
        let child = Self::with_context(&self.inner.event_loop, self.inner.context.clone());
        child.end(move |outcome| filler.settle(outcome));
        child
    }

    /// Alias of [`subgroup`][Self::subgroup].
    pub fn slot_group(&self) -> Group<T> {
        self.subgroup()
    }

    /// Put already known values into the slot sequence, one slot per value.
    ///
    /// The values keep their position relative to asynchronous slots, and
    /// are written on the next tick like any other fill.
    pub fn pass<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.slot().ok(value);
        }
    }

    /// Fulfil the group with `values`, replacing whatever slots it had.
    ///
    /// Only the first resolution counts; later calls are no-ops.
    pub fn resolve(&self, values: Vec<T>) -> &Self {
        self.settle(Ok(values));
        self
    }

    /// Resolve the group with an explicit outcome.
    ///
    /// Only the first resolution counts; later calls are no-ops.
    pub fn resolve_with(&self, outcome: Outcome<T>) -> &Self {
        self.settle(outcome);
        self
    }

    /// Reject the group with `err`.
    ///
    /// Only the first resolution counts; later calls are no-ops.
    pub fn error(&self, err: impl Into<Error>) -> &Self {
        self.settle(Err(err.into()));
        self
    }

    /// Run `body` with this group as its context.
    ///
    /// An error returned from `body`, or a panic inside it, rejects the group.
    /// Returning `Err` is the quiet way to throw: a panic is caught too, but
    /// the process panic hook still reports it on stderr before it becomes
    /// [`Error::Panicked`].
    pub fn fcall<F>(&self, body: F) -> &Self
    where
        F: FnOnce(&Group<T>) -> Result<(), Error>,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| body(self))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.error(err);
            }
            Err(payload) => {
                let err = Error::from_panic(payload);
                tracing::warn!(%err, "group body panicked");
                self.error(err);
            }
        }
        self
    }

    /// Run `body` with this group as its context and `args` as its input.
    pub fn fapply<F>(&self, body: F, args: Vec<T>) -> &Self
    where
        F: FnOnce(&Group<T>, Vec<T>) -> Result<(), Error>,
    {
        self.fcall(move |group| body(group, args))
    }

    /// Bind `body` to this group, returning a function which can be invoked
    /// any number of times, each time running `body` through
    /// [`fapply`][Self::fapply].
    pub fn fbind<F>(&self, body: F) -> impl Fn(Vec<T>) -> Group<T>
    where
        F: Fn(&Group<T>, Vec<T>) -> Result<(), Error> + 'static,
    {
        let group = self.clone();
        move |args| group.fapply(&body, args).clone()
    }

    /// Attach a continuation pair.
    ///
    /// Once this group resolves, `callback` (on fulfilment) or `errback` (on
    /// rejection) runs inside a new child group sharing this group's context.
    /// An error returned from either becomes the child's error, as does a
    /// panic (see [`fcall`][Self::fcall] on why `Err` is preferred). Returns
    /// the child group.
    pub fn then<C, B>(&self, callback: C, errback: B) -> Group<T>
    where
        C: FnOnce(&Group<T>, Vec<T>) -> Result<(), Error> + 'static,
        B: FnOnce(&Group<T>, Error) -> Result<(), Error> + 'static,
    {
        self.sandboxed(move |group, outcome| match outcome {
            Ok(values) => callback(group, values),
            Err(err) => errback(group, err),
        })
    }

    /// Attach a callback; errors are forwarded to the child unchanged.
    pub fn then_ok<C>(&self, callback: C) -> Group<T>
    where
        C: FnOnce(&Group<T>, Vec<T>) -> Result<(), Error> + 'static,
    {
        self.then(callback, Self::rethrow)
    }

    /// Attach an errback; values are propagated to the child unchanged.
    pub fn fail<B>(&self, errback: B) -> Group<T>
    where
        B: FnOnce(&Group<T>, Error) -> Result<(), Error> + 'static,
    {
        self.then(Self::propagate, errback)
    }

    /// Attach a continuation which runs whatever the outcome is.
    pub fn anyway<F>(&self, callback: F) -> Group<T>
    where
        F: FnOnce(&Group<T>, Outcome<T>) -> Result<(), Error> + 'static,
    {
        self.sandboxed(callback)
    }

    /// Attach a terminal continuation.
    ///
    /// Unlike [`then`][Self::then], `callback` runs directly on the event loop,
    /// outside of any group: a panic inside it is not caught and unwinds out
    /// of [`EventLoop::run`].
    pub fn end<F>(&self, callback: F)
    where
        F: FnOnce(Outcome<T>) + 'static,
    {
        self.attach(Box::new(callback));
    }

    /// The default callback: resolve the child with the received values.
    pub fn propagate(group: &Group<T>, values: Vec<T>) -> Result<(), Error> {
        group.resolve(values);
        Ok(())
    }

    /// The default errback: hand the error on to the child.
    pub fn rethrow(_group: &Group<T>, err: Error) -> Result<(), Error> {
        Err(err)
    }

    fn sandboxed<F>(&self, body: F) -> Group<T>
    where
        F: FnOnce(&Group<T>, Outcome<T>) -> Result<(), Error> + 'static,
    {
        let child = Self::with_context(&self.inner.event_loop, self.inner.context.clone());
        let target = child.clone();
        self.attach(Box::new(move |outcome| {
            target.fcall(move |group| body(group, outcome));
        }));
        child
    }

    fn reserve(&self, kind: SlotKind) -> Filler<T> {
        let index = match &mut *self.inner.state.borrow_mut() {
            State::Unresolved { slots, .. } => Some(slots.reserve()),
            State::Settled(_) => None,
        };
        tracing::trace!(slot = ?index, ?kind, "reserved slot");
        Filler::new(self.clone(), index, kind)
    }

    /// Apply a filler's response. Runs on the tick after the filler was called.
    fn fill(&self, index: Option<usize>, kind: SlotKind, response: Outcome<T>) {
        let values = match response {
            Ok(values) => values,
            Err(err) => {
                self.error(err);
                return;
            }
        };

        let value = kind.collapse(values);
        let complete = match (&mut *self.inner.state.borrow_mut(), index) {
            (State::Unresolved { slots, .. }, Some(index)) => {
                debug_assert!(!slots.is_filled(index));
                slots.fill(index, value)
            }
            _ => {
                tracing::trace!(slot = ?index, "ignoring fill of a resolved group");
                false
            }
        };

        if complete {
            let values = match &mut *self.inner.state.borrow_mut() {
                State::Unresolved { slots, .. } => slots.take(),
                State::Settled(_) => return,
            };
            self.settle(Ok(values));
        }
    }

    /// Transition out of `Unresolved` and flush the continuation queue.
    ///
    /// Returns `false` if the group was already resolved.
    fn settle(&self, outcome: Outcome<T>) -> bool {
        let queue = {
            let mut state = self.inner.state.borrow_mut();
            let State::Unresolved { queue, .. } = &mut *state else {
                tracing::trace!("ignoring resolution of a resolved group");
                return false;
            };
            let queue = mem::take(queue);
            *state = State::Settled(outcome.clone());
            queue
        };

        match &outcome {
            Ok(values) => tracing::debug!(values = values.len(), "group fulfilled"),
            Err(err) => tracing::debug!(%err, "group rejected"),
        }

        for reaction in queue {
            self.dispatch(reaction, outcome.clone());
        }
        true
    }

    /// Queue a continuation, or schedule it right away if already resolved.
    fn attach(&self, reaction: Reaction<T>) {
        let outcome = match &mut *self.inner.state.borrow_mut() {
            State::Unresolved { queue, .. } => {
                queue.push_back(reaction);
                return;
            }
            State::Settled(outcome) => outcome.clone(),
        };
        self.dispatch(reaction, outcome);
    }

    fn dispatch(&self, reaction: Reaction<T>, outcome: Outcome<T>) {
        self.inner.event_loop.defer(move || reaction(outcome));
    }
}

impl<T: SlotValue> IntoFuture for Group<T> {
    type Output = Outcome<T>;
    type IntoFuture = Settled<T>;

    fn into_future(self) -> Self::IntoFuture {
        Settled::new(self)
    }
}
