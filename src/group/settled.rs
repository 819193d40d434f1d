use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures_core::Future;

use super::Group;
use crate::{Outcome, SlotValue};

/// A future which resolves with the outcome of a [`Group`].
///
/// This `struct` is created by `Group::into_future`. The group's event loop
/// must be driven for it to make progress, for example with
/// [`EventLoop::block_on`][crate::EventLoop::block_on].
///
/// # Example
///
/// ```rust
/// use flowy::{EventLoop, Value};
/// use serde_json::json;
///
/// let ev = EventLoop::new();
/// let group = ev.group::<Value>();
/// group.pass([json!(1), json!(2)]);
///
/// let values = ev.block_on(group).unwrap().unwrap();
/// assert_eq!(values, [json!(1), json!(2)]);
/// ```
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Settled<T: SlotValue> {
    /// The group to register with, taken on first poll.
    group: Option<Group<T>>,
    waiting: Rc<RefCell<Waiting<T>>>,
    consumed: bool,
}

struct Waiting<T> {
    outcome: Option<Outcome<T>>,
    waker: Option<Waker>,
}

impl<T: SlotValue> Settled<T> {
    pub(crate) fn new(group: Group<T>) -> Self {
        Self {
            group: Some(group),
            waiting: Rc::new(RefCell::new(Waiting {
                outcome: None,
                waker: None,
            })),
            consumed: false,
        }
    }
}

impl<T: SlotValue> fmt::Debug for Settled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled")
            .field("registered", &self.group.is_none())
            .field("consumed", &self.consumed)
            .finish()
    }
}

impl<T: SlotValue> Future for Settled<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        assert!(!this.consumed, "Futures must not be polled after completing");

        if let Some(group) = this.group.take() {
            let waiting = this.waiting.clone();
            group.end(move |outcome| {
                let waker = {
                    let mut waiting = waiting.borrow_mut();
                    waiting.outcome = Some(outcome);
                    waiting.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake();
                }
            });
        }

        let mut waiting = this.waiting.borrow_mut();
        match waiting.outcome.take() {
            Some(outcome) => {
                this.consumed = true;
                Poll::Ready(outcome)
            }
            None => {
                waiting.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
