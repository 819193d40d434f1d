use std::any::Any;
use std::sync::Arc;

/// The error a group is rejected with.
///
/// Errors are shared between every continuation that observes a rejected
/// group, so the payload is reference counted and the type is cheap to clone.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A plain error message.
    #[error("{0}")]
    Message(Arc<str>),
    /// An error raised by some other library.
    #[error("{0}")]
    Source(Arc<dyn std::error::Error + Send + Sync + 'static>),
    /// A sandboxed body panicked.
    #[error("body panicked: {0}")]
    Panicked(Arc<str>),
    /// The event loop ran out of work while a future was still waiting on it.
    #[error("event loop went idle with the future still pending")]
    Stalled,
}

impl Error {
    /// Create an error from a message.
    pub fn msg(message: impl Into<Arc<str>>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an error raised by some other library.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source(Arc::new(err))
    }

    /// Returns `true` if the error came from a panicking body.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    /// Convert a panic payload caught by `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message: Arc<str> = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).into()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str().into()
        } else {
            "opaque panic payload".into()
        };
        Self::Panicked(message)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Source(a), Self::Source(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            (Self::Message(a), Self::Message(b)) | (Self::Panicked(a), Self::Panicked(b)) => a == b,
            (Self::Stalled, Self::Stalled) => true,
            _ => false,
        }
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}
