use core::future::IntoFuture;
use core::task::Poll;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use futures_core::Future;

use crate::{Error, Group, SharedContext, SlotValue};

type Task = Box<dyn FnOnce()>;

/// A single-threaded queue of deferred tasks.
///
/// Every observable effect of a group (filling a slot, running a
/// continuation) is posted to this queue instead of running inside the
/// caller's stack. One task is one "tick".
///
/// Cloning an `EventLoop` yields another handle to the same queue.
///
/// # Example
///
/// ```rust
/// use flowy::{EventLoop, Value};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let ev = EventLoop::new();
/// let group = ev.group::<Value>();
/// let late = group.slot();
/// ev.defer_after(20, move || late.ok("late".into()));
/// group.pass(["early".into()]);
///
/// let seen = Rc::new(RefCell::new(None));
/// let out = seen.clone();
/// group.end(move |outcome| *out.borrow_mut() = Some(outcome));
/// ev.run();
///
/// let values = seen.take().unwrap().unwrap();
/// assert_eq!(values, ["late", "early"]);
/// ```
#[derive(Clone, Default)]
pub struct EventLoop {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("queue", &"[..]")
            .field("len", &self.len())
            .finish()
    }
}

impl EventLoop {
    /// Create a new, empty event loop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new event loop with room for `capacity` queued tasks.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Rc::new(RefCell::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Post a task to run on the next tick, after every task already queued.
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Post a task which runs after `ticks` further ticks have passed.
    ///
    /// `defer_after(0, task)` is the same as `defer(task)`.
    pub fn defer_after<F>(&self, ticks: usize, task: F)
    where
        F: FnOnce() + 'static,
    {
        if ticks == 0 {
            self.defer(task);
        } else {
            let this = self.clone();
            self.defer(move || this.defer_after(ticks - 1, task));
        }
    }

    /// Run a single queued task. Returns `false` if the queue was empty.
    pub fn tick(&self) -> bool {
        // The borrow must end before the task runs: tasks post new tasks.
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty. Returns the number of ticks run.
    ///
    /// A panic raised by a task unwinds out of this method; the remaining
    /// tasks stay queued.
    pub fn run(&self) -> usize {
        let mut ticks = 0;
        while self.tick() {
            ticks += 1;
        }
        tracing::trace!(ticks, "event loop idle");
        ticks
    }

    /// The number of tasks waiting to run.
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Returns `true` if no tasks are waiting to run.
    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Create a new root group scheduled on this loop.
    pub fn group<T: SlotValue>(&self) -> Group<T> {
        Group::new(self)
    }

    /// Create a new root group which carries the given shared context.
    pub fn group_with<T: SlotValue>(&self, context: SharedContext) -> Group<T> {
        Group::with_context(self, context)
    }

    /// Drive the loop until `future` completes.
    ///
    /// This is meant for futures whose progress depends on this loop alone,
    /// such as a [`Group`] converted with `into_future`. If the loop runs out
    /// of tasks while the future is still pending, nothing can ever wake it
    /// and [`Error::Stalled`] is returned.
    pub fn block_on<F>(&self, future: F) -> Result<F::Output, Error>
    where
        F: IntoFuture,
    {
        let future = future.into_future();
        futures_lite::pin!(future);
        futures_lite::future::block_on(futures_lite::future::poll_fn(|cx| loop {
            if let Poll::Ready(output) = future.as_mut().poll(cx) {
                return Poll::Ready(Ok(output));
            }
            if !self.tick() {
                return Poll::Ready(Err(Error::Stalled));
            }
        }))
    }
}
