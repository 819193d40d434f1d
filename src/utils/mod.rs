//! Utilities to implement the group machinery of this crate.

mod slot_vec;

pub(crate) use slot_vec::SlotVec;
