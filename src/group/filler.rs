use std::fmt;

use super::Group;
use crate::{Error, Outcome, SlotValue};

/// How the values handed to a filler become the slot value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotKind {
    /// Keep the first value only.
    Single,
    /// Keep every value, collapsed into one.
    Multi,
}

impl SlotKind {
    pub(crate) fn collapse<T: SlotValue>(self, values: Vec<T>) -> T {
        match self {
            SlotKind::Single => values.into_iter().next().unwrap_or_default(),
            SlotKind::Multi => T::from(values),
        }
    }
}

/// The error-first callback which fills one reserved slot of a [`Group`].
///
/// Calling any of the filling methods consumes the filler, so each slot is
/// filled at most once. The write itself happens on the next tick of the
/// group's event loop, never inside the caller's stack.
///
/// Dropping a filler without calling it leaves its slot pending, and the group
/// unresolved, for good.
#[must_use = "the slot stays pending until the filler is called"]
pub struct Filler<T: SlotValue> {
    group: Group<T>,
    index: Option<usize>,
    kind: SlotKind,
    called: bool,
}

impl<T: SlotValue> fmt::Debug for Filler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filler")
            .field("position", &self.index)
            .field("multi", &self.is_multi())
            .finish()
    }
}

impl<T: SlotValue> Filler<T> {
    pub(crate) fn new(group: Group<T>, index: Option<usize>, kind: SlotKind) -> Self {
        Self {
            group,
            index,
            kind,
            called: false,
        }
    }

    /// The position of the slot among the group's values.
    ///
    /// `None` if the slot was reserved after the group resolved.
    pub fn position(&self) -> Option<usize> {
        self.index
    }

    /// Returns `true` if this slot keeps all values of the callback.
    pub fn is_multi(&self) -> bool {
        self.kind == SlotKind::Multi
    }

    /// Invoke the filler with an error-first response.
    ///
    /// `Err` rejects the whole group. `Ok(values)` fills the slot: a single
    /// slot keeps the first value (or `T::default()` if there is none), a
    /// multi slot keeps all of them.
    pub fn settle(mut self, response: Outcome<T>) {
        self.called = true;
        tracing::trace!(slot = ?self.index, ok = response.is_ok(), "slot filler called");
        let (group, index, kind) = (self.group.clone(), self.index, self.kind);
        self.group
            .event_loop()
            .defer(move || group.fill(index, kind, response));
    }

    /// Fill the slot with a value.
    pub fn ok(self, value: T) {
        self.settle(Ok(vec![value]));
    }

    /// Reject the group with `err`.
    pub fn fail(self, err: impl Into<Error>) {
        self.settle(Err(err.into()));
    }

    /// Fill the slot from a single-valued result.
    pub fn complete(self, result: Result<T, Error>) {
        self.settle(result.map(|value| vec![value]));
    }

    /// Turn the filler into a plain error-first callback.
    pub fn into_callback(self) -> impl FnOnce(Outcome<T>) + 'static {
        move |response| self.settle(response)
    }
}

impl<T: SlotValue> Drop for Filler<T> {
    fn drop(&mut self) {
        if !self.called && self.index.is_some() {
            tracing::debug!(slot = ?self.index, "slot filler dropped without being called");
        }
    }
}
