//! Values carried by the slots of a group.

/// The dynamically-typed value bundled with this crate, and the default slot
/// value of [`Group`](crate::Group) and [`Flow`](crate::Flow).
///
/// A multi slot or a subgroup collapses into a [`Value::Array`]; a single
/// slot filled without data holds [`Value::Null`].
pub use serde_json::Value;

/// The bound every slot value satisfies.
///
/// - `Default` is the value of a single slot filled without any data.
/// - `From<Vec<Self>>` collapses a multi slot or a subgroup into one slot.
///
/// This is implemented for every type which meets the bounds, including
/// [`Value`].
pub trait SlotValue: Sized + Clone + Default + From<Vec<Self>> + 'static {}

impl<T> SlotValue for T where T: Sized + Clone + Default + From<Vec<T>> + 'static {}

#[cfg(test)]
mod test {
    use super::{SlotValue, Value};
    use serde_json::json;

    fn collapse<T: SlotValue>(values: Vec<T>) -> T {
        T::from(values)
    }

    #[test]
    fn json_values_collapse_into_arrays() {
        let list = collapse(vec![json!("a"), json!(1)]);
        assert_eq!(list, json!(["a", 1]));
        assert!(Value::default().is_null());
    }

    #[test]
    fn custom_slot_values() {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Count(usize);

        impl From<Vec<Count>> for Count {
            fn from(counts: Vec<Count>) -> Self {
                Count(counts.into_iter().map(|c| c.0).sum())
            }
        }

        assert_eq!(collapse(vec![Count(2), Count(3)]), Count(5));
    }
}
