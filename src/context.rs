use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A key-value map shared by every group of one chain.
///
/// Groups created through `then`, `anyway`, `fail` and `subgroup` receive a
/// handle to the same map as their parent, so a value stored by one step is
/// visible to every later step. Only one step body runs at a time, so the map
/// is never written concurrently.
///
/// # Example
///
/// ```rust
/// use flowy::SharedContext;
///
/// let context = SharedContext::new();
/// let other = context.clone();
/// context.insert("message", String::from("hello"));
/// assert_eq!(other.get::<String>("message").as_deref().map(String::as_str), Some("hello"));
/// ```
#[derive(Clone, Default)]
pub struct SharedContext {
    entries: Rc<RefCell<HashMap<String, Rc<dyn Any>>>>,
}

impl fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        let mut keys: Vec<_> = entries.keys().collect();
        keys.sort();
        f.debug_struct("SharedContext").field("keys", &keys).finish()
    }
}

impl SharedContext {
    /// The reserved key under which a composed flow stores its receiver.
    pub const RECEIVER_KEY: &'static str = "self";

    /// Create a new, empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`, replacing any previous value.
    pub fn insert<V: Any>(&self, key: impl Into<String>, value: V) {
        self.insert_rc(key, Rc::new(value));
    }

    /// Store an already shared value under `key`.
    pub fn insert_rc(&self, key: impl Into<String>, value: Rc<dyn Any>) {
        self.entries.borrow_mut().insert(key.into(), value);
    }

    /// Get the value stored under `key` if it has type `V`.
    pub fn get<V: Any>(&self, key: &str) -> Option<Rc<V>> {
        let value = self.entries.borrow().get(key).cloned()?;
        value.downcast::<V>().ok()
    }

    /// Returns `true` if any value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Remove the value stored under `key`, returning it.
    pub fn remove(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.entries.borrow_mut().remove(key)
    }

    /// Store the receiver a composed flow was invoked with.
    pub fn set_receiver(&self, receiver: Rc<dyn Any>) {
        self.insert_rc(Self::RECEIVER_KEY, receiver);
    }

    /// The receiver a composed flow was invoked with, if it has type `V`.
    pub fn receiver<V: Any>(&self) -> Option<Rc<V>> {
        self.get(Self::RECEIVER_KEY)
    }

    /// Returns `true` if both handles point to the same map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}
