//! Explicit-state deferred values.
//!
//! A [`Promise`] is a shared slot that settles exactly once, either
//! resolved with a JSON value or rejected with a [`WaitError`].
//! Callbacks registered before settlement are queued; callbacks
//! registered after fire immediately and synchronously. There is no
//! task or executor underneath: whoever owns a clone settles it.

use crate::WaitError;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Observable promise state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Resolved,
    /// Settled with an error.
    Rejected,
}

/// A settled outcome, delivered to `always` callbacks.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The promise resolved with this value.
    Resolved(Value),
    /// The promise rejected with this error.
    Rejected(WaitError),
}

impl Outcome {
    /// Returns `true` for a resolution.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Returns the resolved value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    /// Returns the rejection error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&WaitError> {
        match self {
            Self::Resolved(_) => None,
            Self::Rejected(error) => Some(error),
        }
    }
}

type DoneFn = Box<dyn FnOnce(Value) + Send>;
type FailFn = Box<dyn FnOnce(WaitError) + Send>;
type AlwaysFn = Box<dyn FnOnce(Outcome) + Send>;
type AbortFn = Box<dyn FnOnce() + Send>;

enum State {
    Pending {
        done: Vec<DoneFn>,
        fail: Vec<FailFn>,
        always: Vec<AlwaysFn>,
        abort: Option<AbortFn>,
    },
    Settled(Outcome),
}

impl State {
    fn pending() -> Self {
        Self::Pending {
            done: Vec::new(),
            fail: Vec::new(),
            always: Vec::new(),
            abort: None,
        }
    }
}

/// A shared, settle-once deferred value.
///
/// Clones share the same slot. Settling is first-writer-wins: the
/// second `resolve`/`reject` is a no-op returning `false`.
///
/// # Example
///
/// ```
/// use fossil_wait::{Promise, PromiseState};
/// use serde_json::json;
///
/// let promise = Promise::new();
/// assert_eq!(promise.state(), PromiseState::Pending);
///
/// promise.done(|value| assert_eq!(value, json!("ready")));
/// assert!(promise.resolve(json!("ready")));
/// assert!(!promise.resolve(json!("again")));
/// assert_eq!(promise.state(), PromiseState::Resolved);
/// ```
#[derive(Clone)]
pub struct Promise {
    inner: Arc<Mutex<State>>,
}

impl Promise {
    /// Creates a pending promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::pending())),
        }
    }

    /// Creates an already-resolved promise.
    #[must_use]
    pub fn resolved(value: Value) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::Settled(Outcome::Resolved(value)))),
        }
    }

    /// Creates an already-rejected promise.
    #[must_use]
    pub fn rejected(error: WaitError) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::Settled(Outcome::Rejected(error)))),
        }
    }

    /// Resolves the promise. Returns `false` if it was already settled.
    pub fn resolve(&self, value: Value) -> bool {
        self.settle(Outcome::Resolved(value))
    }

    /// Rejects the promise. Returns `false` if it was already settled.
    pub fn reject(&self, error: WaitError) -> bool {
        self.settle(Outcome::Rejected(error))
    }

    fn settle(&self, outcome: Outcome) -> bool {
        let (done, fail, always) = {
            let mut state = self.inner.lock();
            match std::mem::replace(&mut *state, State::Settled(outcome.clone())) {
                State::Pending {
                    done, fail, always, ..
                } => (done, fail, always),
                already @ State::Settled(_) => {
                    *state = already;
                    return false;
                }
            }
        };
        // Callbacks run outside the lock: they may inspect or clone
        // this promise.
        match &outcome {
            Outcome::Resolved(value) => {
                for f in done {
                    f(value.clone());
                }
            }
            Outcome::Rejected(error) => {
                for f in fail {
                    f(error.clone());
                }
            }
        }
        for f in always {
            f(outcome.clone());
        }
        true
    }

    /// Registers a resolution callback.
    ///
    /// Fires immediately if the promise is already resolved; never
    /// fires on rejection.
    pub fn done<F>(&self, f: F) -> &Self
    where
        F: FnOnce(Value) + Send + 'static,
    {
        let mut callback = Some(f);
        let immediate = {
            let mut state = self.inner.lock();
            match &mut *state {
                State::Pending { done, .. } => {
                    if let Some(f) = callback.take() {
                        done.push(Box::new(f));
                    }
                    None
                }
                State::Settled(Outcome::Resolved(value)) => Some(value.clone()),
                State::Settled(Outcome::Rejected(_)) => None,
            }
        };
        if let (Some(value), Some(f)) = (immediate, callback.take()) {
            f(value);
        }
        self
    }

    /// Registers a rejection callback.
    pub fn fail<F>(&self, f: F) -> &Self
    where
        F: FnOnce(WaitError) + Send + 'static,
    {
        let mut callback = Some(f);
        let immediate = {
            let mut state = self.inner.lock();
            match &mut *state {
                State::Pending { fail, .. } => {
                    if let Some(f) = callback.take() {
                        fail.push(Box::new(f));
                    }
                    None
                }
                State::Settled(Outcome::Rejected(error)) => Some(error.clone()),
                State::Settled(Outcome::Resolved(_)) => None,
            }
        };
        if let (Some(error), Some(f)) = (immediate, callback.take()) {
            f(error);
        }
        self
    }

    /// Registers a callback fired on settlement of either kind.
    pub fn always<F>(&self, f: F) -> &Self
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let mut callback = Some(f);
        let immediate = {
            let mut state = self.inner.lock();
            match &mut *state {
                State::Pending { always, .. } => {
                    if let Some(f) = callback.take() {
                        always.push(Box::new(f));
                    }
                    None
                }
                State::Settled(outcome) => Some(outcome.clone()),
            }
        };
        if let (Some(outcome), Some(f)) = (immediate, callback.take()) {
            f(outcome);
        }
        self
    }

    /// Installs the cooperative abort hook.
    ///
    /// Replaces any previous hook. Ignored once settled.
    pub fn on_abort<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.lock();
        if let State::Pending { abort, .. } = &mut *state {
            *abort = Some(Box::new(f));
        }
        self
    }

    /// Runs the abort hook (if installed) and rejects with `error`.
    ///
    /// Returns `false` if the promise had already settled.
    pub fn abort(&self, error: WaitError) -> bool {
        let hook = {
            let mut state = self.inner.lock();
            match &mut *state {
                State::Pending { abort, .. } => abort.take(),
                State::Settled(_) => None,
            }
        };
        if let Some(hook) = hook {
            hook();
        }
        self.reject(error)
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        match &*self.inner.lock() {
            State::Pending { .. } => PromiseState::Pending,
            State::Settled(Outcome::Resolved(_)) => PromiseState::Resolved,
            State::Settled(Outcome::Rejected(_)) => PromiseState::Rejected,
        }
    }

    /// Returns `true` while unsettled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Returns the resolved value, if resolved.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        match &*self.inner.lock() {
            State::Settled(Outcome::Resolved(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the rejection error, if rejected.
    #[must_use]
    pub fn error(&self) -> Option<WaitError> {
        match &*self.inner.lock() {
            State::Settled(Outcome::Rejected(error)) => Some(error.clone()),
            _ => None,
        }
    }
}

impl Default for Promise {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("state", &self.state()).finish()
    }
}
