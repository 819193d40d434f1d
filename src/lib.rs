//! Slot groups and step chains for callback-style asynchronous code.
//!
//! A [`Group`] fans out several asynchronous operations that report back
//! through error-first callbacks, waits until every one of them completes (or
//! any one fails), and then continues with all of their results as one
//! ordered sequence. A [`Flow`] threads a list of steps through successive
//! groups to build an end-to-end pipeline.
//!
//! Everything runs on a single-threaded [`EventLoop`]. Filling a slot or
//! running a continuation is always deferred to a later tick of that loop,
//! so a body can reserve all of its slots before any of them is observed.
//!
//! # Operations
//!
//! - [`Group::slot`], [`Group::multi_slot`]: reserve a position for a result.
//! - [`Group::pass`]: put already known values into the same sequence.
//! - [`Group::subgroup`]: nest a group whose values fill one slot.
//! - [`Group::then`], [`Group::fail`], [`Group::anyway`]: chain continuations,
//!   each running inside its own child group.
//! - [`Group::end`]: terminate a chain with a plain callback.
//! - [`Flow`], [`flow::compose`], [`flow::run`]: chains of steps.
//!
//! # Examples
//!
//! Wait for an out-of-order asynchronous result and a synchronous value:
//!
//! ```rust
//! use flowy::{EventLoop, Group, Value};
//!
//! let ev = EventLoop::new();
//! let group = Group::<Value>::chain(&ev, |group| {
//!     let slot = group.slot();
//!     group.event_loop().defer_after(20, move || slot.ok("late".into()));
//!     group.pass(["early".into()]);
//!     Ok(())
//! });
//!
//! let values = ev.block_on(group).unwrap().unwrap();
//! assert_eq!(values, ["late", "early"]);
//! ```

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod context;
mod error;
mod event_loop;
mod utils;
mod value;

pub mod flow;
pub mod group;

pub use context::SharedContext;
pub use error::Error;
pub use event_loop::EventLoop;
pub use flow::{Flow, Step};
pub use group::{Filler, Group, GroupState, Settled};
pub use value::{SlotValue, Value};

/// The outcome of a resolved group: its values in reservation order, or the
/// error which rejected it.
pub type Outcome<T = Value> = Result<Vec<T>, Error>;

/// The flowy prelude.
pub mod prelude {
    pub use super::flow::{self, Flow, Step};
    pub use super::{Error, EventLoop, Filler, Group, Outcome, SharedContext, Value};
    pub use serde_json::json;
}
