//! Step chains built on top of [`Group`].
//!
//! A [`Flow`] threads a list of steps through successive groups: the values a
//! step publishes into its group become the input of the next step, and the
//! outcome of the last step is handed to a plain error-first callback.
//!
//! ```rust
//! use flowy::{EventLoop, Flow, Value};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let ev = EventLoop::new();
//! let flow = Flow::<Value>::new(&ev)
//!     .step(|group, input| {
//!         let name = input?.remove(0);
//!         let slot = group.slot();
//!         group.event_loop().defer(move || slot.ok(name));
//!         Ok(())
//!     })
//!     .step(|group, input| {
//!         let greeting = format!("hello {}", input?[0].as_str().unwrap_or_default());
//!         group.pass([greeting.into()]);
//!         Ok(())
//!     });
//!
//! let seen = Rc::new(RefCell::new(None));
//! let out = seen.clone();
//! flow.call(vec![Value::from("world")], move |outcome| {
//!     *out.borrow_mut() = Some(outcome);
//! });
//! ev.run();
//! assert_eq!(seen.take(), Some(Ok(vec![Value::from("hello world")])));
//! ```

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::{Error, EventLoop, Group, Outcome, SharedContext, SlotValue, Value};

/// One step of a flow.
///
/// A step runs inside the group its outputs go to, and receives the outcome
/// of the previous step. Returning an error rejects its group.
pub type Step<T = Value> = Rc<dyn Fn(&Group<T>, Outcome<T>) -> Result<(), Error>>;

/// How a flow links its steps together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Steps only run on success. An error skips every remaining step and
    /// goes straight to the final callback.
    #[default]
    Waterfall,
    /// Every step runs, and sees the error of the previous one if any.
    Tolerant,
}

/// A reusable chain of steps.
///
/// Cloning a flow is cheap; steps are shared.
#[derive(Clone)]
pub struct Flow<T = Value> {
    event_loop: EventLoop,
    steps: Vec<Step<T>>,
    mode: Mode,
}

impl<T> fmt::Debug for Flow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("steps", &self.steps.len())
            .field("mode", &self.mode)
            .finish()
    }
}

impl<T: SlotValue> Flow<T> {
    /// Create an empty flow running on `event_loop`.
    pub fn new(event_loop: &EventLoop) -> Self {
        Self {
            event_loop: event_loop.clone(),
            steps: Vec::new(),
            mode: Mode::Waterfall,
        }
    }

    /// Append a step.
    pub fn step<F>(mut self, step: F) -> Self
    where
        F: Fn(&Group<T>, Outcome<T>) -> Result<(), Error> + 'static,
    {
        self.steps.push(Rc::new(step));
        self
    }

    /// Append several steps.
    pub fn steps<I>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = Step<T>>,
    {
        self.steps.extend(steps);
        self
    }

    /// Let every step observe errors instead of skipping to the end.
    pub fn tolerant(mut self) -> Self {
        self.mode = Mode::Tolerant;
        self
    }

    /// How the steps are linked.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the flow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the flow with `args` as the input of the first step.
    ///
    /// `callback` receives the outcome of the last step. It runs outside of
    /// any group: a panic inside it unwinds out of the event loop.
    pub fn call<C>(&self, args: Vec<T>, callback: C)
    where
        C: FnOnce(Outcome<T>) + 'static,
    {
        self.start(SharedContext::new(), Ok(args), callback);
    }

    /// Run the flow with a full outcome as the input of the first step.
    ///
    /// A [tolerant](Mode::Tolerant) flow hands a seed error to its first step;
    /// a waterfall flow passes it straight to `callback`.
    pub fn call_outcome<C>(&self, input: Outcome<T>, callback: C)
    where
        C: FnOnce(Outcome<T>) + 'static,
    {
        self.start(SharedContext::new(), input, callback);
    }

    /// Run the flow on behalf of `receiver`.
    ///
    /// The receiver is stored in the shared context of the chain, where every
    /// step can read it back through [`Group::receiver`].
    pub fn call_with<C>(&self, receiver: Rc<dyn Any>, args: Vec<T>, callback: C)
    where
        C: FnOnce(Outcome<T>) + 'static,
    {
        let context = SharedContext::new();
        context.set_receiver(receiver);
        self.start(context, Ok(args), callback);
    }

    /// Run the flow without input.
    pub fn run<C>(&self, callback: C)
    where
        C: FnOnce(Outcome<T>) + 'static,
    {
        self.call(Vec::new(), callback);
    }

    fn start<C>(&self, context: SharedContext, input: Outcome<T>, callback: C)
    where
        C: FnOnce(Outcome<T>) + 'static,
    {
        tracing::debug!(steps = self.steps.len(), mode = ?self.mode, "starting flow");
        let first = Group::with_context(&self.event_loop, context);
        first.resolve_with(input);

        let last = self.steps.iter().fold(first, |chain, step| {
            let step = Rc::clone(step);
            match self.mode {
                Mode::Waterfall => chain.then_ok(move |group, values| step(group, Ok(values))),
                Mode::Tolerant => chain.anyway(move |group, outcome| step(group, outcome)),
            }
        });
        last.end(callback);
    }
}

/// Wrap a closure into a [`Step`].
pub fn step<T, F>(step: F) -> Step<T>
where
    T: SlotValue,
    F: Fn(&Group<T>, Outcome<T>) -> Result<(), Error> + 'static,
{
    Rc::new(step)
}

/// Build a waterfall flow from `steps`.
pub fn compose<T, I>(event_loop: &EventLoop, steps: I) -> Flow<T>
where
    T: SlotValue,
    I: IntoIterator<Item = Step<T>>,
{
    Flow::new(event_loop).steps(steps)
}

/// Build a tolerant flow from `steps`.
pub fn tolerant<T, I>(event_loop: &EventLoop, steps: I) -> Flow<T>
where
    T: SlotValue,
    I: IntoIterator<Item = Step<T>>,
{
    Flow::new(event_loop).steps(steps).tolerant()
}

/// Build a waterfall flow from `steps` and start it right away.
pub fn run<T, I, C>(event_loop: &EventLoop, steps: I, callback: C)
where
    T: SlotValue,
    I: IntoIterator<Item = Step<T>>,
    C: FnOnce(Outcome<T>) + 'static,
{
    compose(event_loop, steps).run(callback);
}

/// A step which hands its input on unchanged.
pub fn pass_through<T: SlotValue>() -> Step<T> {
    step(|group, input| {
        group.resolve(input?);
        Ok(())
    })
}

/// Adapt a step which only handles values, so that a received error is
/// raised again instead.
///
/// Useful in [tolerant](Mode::Tolerant) flows.
pub fn throw_if_error<T, F>(step_fn: F) -> Step<T>
where
    T: SlotValue,
    F: Fn(&Group<T>, Vec<T>) -> Result<(), Error> + 'static,
{
    step(move |group, input| step_fn(group, input?))
}
