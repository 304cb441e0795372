//! Event arguments and handler types.
//!
//! Bus events carry a positional argument list. Data travels as JSON
//! values; object references (modules, views) travel as opaque handles
//! that listeners downcast back to their concrete type.

use crate::PubSub;
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Positional argument list of an event.
pub type Args = Vec<Arg>;

/// A listener callback.
///
/// Receives the event's arguments and may return a value. Return
/// values are ignored by plain broadcast and surfaced by the `one!`
/// and `map!` delivery strategies.
pub type Handler = Arc<Mutex<dyn FnMut(&[Arg]) -> Option<Arg> + Send>>;

/// Wraps a closure into a [`Handler`].
///
/// # Example
///
/// ```
/// use fossil_event::{handler, Arg};
///
/// let count = handler(|args: &[Arg]| Some(Arg::json(args.len())));
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: FnMut(&[Arg]) -> Option<Arg> + Send + 'static,
{
    Arc::new(Mutex::new(f))
}

/// One positional event argument.
///
/// | Variant | Carries |
/// |---------|---------|
/// | `Json` | data payload |
/// | `Handle` | opaque object reference, downcastable |
/// | `Callback` | a handler passed as data (route callbacks) |
/// | `Pubsub` | a bus capability handle (parent references) |
/// | `SelfRef` | "the emitting bus itself", rewritten at buffer replay |
#[derive(Clone)]
pub enum Arg {
    /// JSON data payload.
    Json(Value),
    /// Opaque shared object reference.
    Handle(Arc<dyn Any + Send + Sync>),
    /// A handler carried as an argument.
    Callback(Handler),
    /// A bus capability handle.
    Pubsub(PubSub),
    /// Placeholder for the emitting bus, resolved when a buffered call
    /// is replayed onto a live bus.
    SelfRef,
}

impl Arg {
    /// Builds a JSON argument from anything serde_json can represent
    /// directly.
    #[must_use]
    pub fn json(value: impl Into<Value>) -> Self {
        Self::Json(value.into())
    }

    /// Builds a handle argument from an owned value.
    #[must_use]
    pub fn handle<T: Any + Send + Sync>(value: T) -> Self {
        Self::Handle(Arc::new(value))
    }

    /// Builds a handle argument from an already-shared value.
    #[must_use]
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::Handle(value)
    }

    /// Returns the JSON payload, if this is a data argument.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the payload as a string slice, if this is a JSON string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    /// Downcasts a handle argument to its concrete type.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Handle(handle) => Arc::clone(handle).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Returns the carried handler, if any.
    #[must_use]
    pub fn as_callback(&self) -> Option<Handler> {
        match self {
            Self::Callback(cb) => Some(Arc::clone(cb)),
            _ => None,
        }
    }

    /// Returns the carried bus handle, if any.
    #[must_use]
    pub fn as_pubsub(&self) -> Option<PubSub> {
        match self {
            Self::Pubsub(pubsub) => Some(pubsub.clone()),
            _ => None,
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => write!(f, "Json({value})"),
            Self::Handle(_) => f.write_str("Handle(..)"),
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Pubsub(pubsub) => write!(f, "Pubsub({pubsub:?})"),
            Self::SelfRef => f.write_str("SelfRef"),
        }
    }
}
