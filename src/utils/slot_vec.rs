use fixedbitset::FixedBitSet;
use smallvec::SmallVec;

/// The maximum number of slots stored without a heap allocation.
const MAX_INLINE_SLOTS: usize = 4;

/// Ordered storage for slot values which are filled out of order.
///
/// Positions are handed out in reservation order and read back in the same
/// order, no matter in which order they were filled.
#[derive(Debug)]
pub(crate) struct SlotVec<T> {
    values: SmallVec<[Option<T>; MAX_INLINE_SLOTS]>,
    filled: FixedBitSet,
    pending: usize,
}

impl<T> Default for SlotVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotVec<T> {
    pub(crate) fn new() -> Self {
        Self {
            values: SmallVec::new(),
            filled: FixedBitSet::new(),
            pending: 0,
        }
    }

    /// Reserve the next position. Returns its index.
    pub(crate) fn reserve(&mut self) -> usize {
        let index = self.values.len();
        self.values.push(None);
        self.filled.grow(index + 1);
        self.pending += 1;
        index
    }

    /// Write the value for a reserved position.
    ///
    /// Returns `true` if this was the last pending position.
    pub(crate) fn fill(&mut self, index: usize, value: T) -> bool {
        debug_assert!(index < self.values.len(), "slot {index} was never reserved");
        let was_filled = self.filled.put(index);
        debug_assert!(!was_filled, "slot {index} filled twice");
        if was_filled {
            return false;
        }
        self.values[index] = Some(value);
        self.pending -= 1;
        self.pending == 0
    }

    /// Returns `true` if the position at `index` holds a value.
    pub(crate) fn is_filled(&self, index: usize) -> bool {
        self.filled.contains(index)
    }

    /// The number of reserved positions.
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    /// The number of reserved positions which are not yet filled.
    pub(crate) fn pending(&self) -> usize {
        self.pending
    }

    /// Take all values in reservation order, leaving the storage empty.
    pub(crate) fn take(&mut self) -> Vec<T> {
        debug_assert_eq!(self.pending, 0, "taking values of unfilled slots");
        self.filled.clear();
        self.pending = 0;
        self.values.drain(..).flatten().collect()
    }
}

#[cfg(test)]
mod test {
    use super::{SlotVec, MAX_INLINE_SLOTS};

    #[test]
    fn reads_back_in_reservation_order() {
        let mut slots = SlotVec::new();
        let a = slots.reserve();
        let b = slots.reserve();
        let c = slots.reserve();
        assert_eq!(slots.pending(), 3);

        assert!(!slots.fill(c, "c"));
        assert!(!slots.fill(a, "a"));
        assert!(slots.is_filled(a));
        assert!(!slots.is_filled(b));
        assert!(slots.fill(b, "b"));

        assert_eq!(slots.take(), ["a", "b", "c"]);
        assert_eq!(slots.len(), 0);
    }

    #[test]
    fn spills_to_the_heap() {
        let mut slots = SlotVec::new();
        let n = MAX_INLINE_SLOTS * 4;
        let indexes: Vec<_> = (0..n).map(|_| slots.reserve()).collect();
        for i in indexes.into_iter().rev() {
            slots.fill(i, i);
        }
        assert_eq!(slots.pending(), 0);
        assert_eq!(slots.take(), (0..n).collect::<Vec<_>>());
    }
}
