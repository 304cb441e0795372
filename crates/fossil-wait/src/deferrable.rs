//! The Wait join and its owner state.

use crate::{Outcome, Promise, WaitError};
use fossil_types::WaitId;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Rejection message used by [`Deferrable::abort`] when the caller
/// does not supply one.
pub const DEFAULT_ABORT_MESSAGE: &str = "wait aborted";

/// Per-operation join options.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    /// Window within which the operation must settle. A miss rejects
    /// that operation with [`WaitError::Timeout`]. Off by default.
    /// Requires a Tokio runtime.
    pub timeout: Option<Duration>,
    /// `true` (default): a rejection of this operation rejects the
    /// whole join immediately. `false`: the join waits for every
    /// operation to settle and only then fails if any failed.
    pub fail_fast: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            fail_fast: true,
        }
    }
}

impl WaitOptions {
    /// Options with the fail-silent policy.
    #[must_use]
    pub fn fail_silent() -> Self {
        Self {
            fail_fast: false,
            ..Self::default()
        }
    }

    /// Sets the settle window.
    #[must_use]
    pub fn with_timeout(mut self, window: Duration) -> Self {
        self.timeout = Some(window);
        self
    }
}

enum SlotState {
    Pending,
    Resolved(Value),
    Rejected(WaitError),
}

struct Slot {
    state: SlotState,
    fail_fast: bool,
    timer: Option<JoinHandle<()>>,
}

/// One join generation: the composite promise plus per-operation slots.
struct Wait {
    id: WaitId,
    composite: Promise,
    slots: Vec<Slot>,
    tracked: Vec<Promise>,
}

impl Wait {
    fn new() -> Self {
        Self {
            id: WaitId::new(),
            composite: Promise::new(),
            slots: Vec::new(),
            tracked: Vec::new(),
        }
    }

    fn clear_timers(&mut self) {
        for slot in &mut self.slots {
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
        }
    }
}

/// Owner of at most one active join.
///
/// `wait_for` lazily opens a join and enqueues operations into it; the
/// join is consumed by its completion (or by [`abort`](Self::abort)),
/// after which the next `wait_for` opens a fresh generation.
///
/// Clones share the same join state; a module and its lifecycle
/// machinery hold clones of one `Deferrable`.
///
/// # Example
///
/// ```
/// use fossil_wait::{Deferrable, Promise, WaitOptions};
/// use serde_json::json;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let deferrable = Deferrable::new();
///
/// // Nothing in flight: ready by definition, callback is synchronous.
/// let ready = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&ready);
/// deferrable.then(move |_| flag.store(true, Ordering::SeqCst));
/// assert!(ready.load(Ordering::SeqCst));
///
/// let work = Promise::new();
/// deferrable.wait_for(&work, WaitOptions::default());
/// assert!(deferrable.is_waiting());
///
/// work.resolve(json!("done"));
/// assert!(!deferrable.is_waiting());
/// ```
#[derive(Clone, Default)]
pub struct Deferrable {
    active: Arc<Mutex<Option<Wait>>>,
}

impl Deferrable {
    /// Creates an idle owner with no active join.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues an operation into the active join, opening one if
    /// needed.
    ///
    /// The promise is tagged with the join's generation; a settlement
    /// arriving after the join was consumed is discarded. An
    /// already-settled promise completes its slot immediately, which
    /// may complete the whole join on the spot.
    pub fn wait_for(&self, promise: &Promise, options: WaitOptions) -> &Self {
        let (generation, index) = {
            let mut active = self.active.lock();
            let wait = active.get_or_insert_with(Wait::new);
            let index = wait.slots.len();
            wait.slots.push(Slot {
                state: SlotState::Pending,
                fail_fast: options.fail_fast,
                timer: None,
            });
            wait.tracked.push(promise.clone());
            (wait.id, index)
        };
        trace!(generation = %generation, index, "operation enqueued");

        if let Some(window) = options.timeout {
            let target = promise.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep(window).await;
                if target.reject(WaitError::Timeout) {
                    debug!(window_ms = window.as_millis() as u64, "tracked operation timed out");
                }
            });
            let mut active = self.active.lock();
            match active.as_mut() {
                Some(wait) if wait.id == generation => wait.slots[index].timer = Some(timer),
                // The join completed before the timer was stored
                // (already-settled promise); the timer is obsolete.
                _ => timer.abort(),
            }
        }

        let owner = self.clone();
        promise.always(move |outcome| owner.record(generation, index, outcome));
        self
    }

    /// Enqueues a plain value, wrapped in a promise that resolves from
    /// a spawned task. Requires a Tokio runtime.
    pub fn wait_for_value(&self, value: Value, options: WaitOptions) -> &Self {
        let promise = Promise::new();
        let settle = promise.clone();
        tokio::spawn(async move {
            settle.resolve(value);
        });
        self.wait_for(&promise, options)
    }

    /// Records one operation's settlement.
    fn record(&self, generation: WaitId, index: usize, outcome: Outcome) {
        let completed = {
            let mut active = self.active.lock();
            let Some(wait) = active.as_mut() else {
                trace!(generation = %generation, "stale settlement discarded");
                return;
            };
            if wait.id != generation {
                trace!(generation = %generation, current = %wait.id, "stale settlement discarded");
                return;
            }
            let slot = &mut wait.slots[index];
            if !matches!(slot.state, SlotState::Pending) {
                return;
            }
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            let fail_fast = slot.fail_fast;
            match outcome {
                Outcome::Resolved(value) => slot.state = SlotState::Resolved(value),
                Outcome::Rejected(error) => {
                    slot.state = SlotState::Rejected(error.clone());
                    if fail_fast {
                        let wait = active.take();
                        drop(active);
                        if let Some(mut wait) = wait {
                            debug!(generation = %generation, error = %error, "join rejected (fail-fast)");
                            wait.clear_timers();
                            wait.composite.reject(error);
                        }
                        return;
                    }
                }
            }
            let all_settled = active
                .as_ref()
                .is_some_and(|w| w.slots.iter().all(|s| !matches!(s.state, SlotState::Pending)));
            if all_settled {
                active.take()
            } else {
                None
            }
        };

        // Completion runs outside the lock: composite callbacks may
        // re-enter this owner.
        if let Some(mut wait) = completed {
            wait.clear_timers();
            let failed = wait
                .slots
                .iter()
                .any(|s| matches!(s.state, SlotState::Rejected(_)));
            if failed {
                debug!(generation = %wait.id, "join rejected (fail-silent)");
                wait.composite.reject(WaitError::JoinFailed);
            } else {
                let results: Vec<Value> = wait
                    .slots
                    .iter()
                    .map(|s| match &s.state {
                        SlotState::Resolved(value) => value.clone(),
                        _ => Value::Null,
                    })
                    .collect();
                trace!(generation = %wait.id, results = results.len(), "join resolved");
                wait.composite.resolve(Value::Array(results));
            }
        }
    }

    fn composite(&self) -> Option<Promise> {
        self.active.lock().as_ref().map(|w| w.composite.clone())
    }

    /// Registers a readiness callback.
    ///
    /// With no active join the callback fires synchronously with JSON
    /// null; otherwise it fires when the join resolves, with the
    /// ordered array of operation results.
    pub fn then<F>(&self, on_ready: F) -> &Self
    where
        F: FnOnce(Value) + Send + 'static,
    {
        match self.composite() {
            Some(composite) => {
                composite.done(on_ready);
            }
            None => on_ready(Value::Null),
        }
        self
    }

    /// Registers readiness and failure callbacks.
    pub fn then_or_else<F, G>(&self, on_ready: F, on_error: G) -> &Self
    where
        F: FnOnce(Value) + Send + 'static,
        G: FnOnce(WaitError) + Send + 'static,
    {
        match self.composite() {
            Some(composite) => {
                composite.done(on_ready).fail(on_error);
            }
            None => on_ready(Value::Null),
        }
        self
    }

    /// Registers a callback fired however the join settles; fires
    /// synchronously when nothing is in flight.
    pub fn finally<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        match self.composite() {
            Some(composite) => {
                composite.always(move |_| f());
            }
            None => f(),
        }
        self
    }

    /// Aborts the active join, if any.
    ///
    /// Every still-pending tracked promise gets a cooperative
    /// `abort()` (running its hook, if installed), then the composite
    /// is force-rejected with [`WaitError::Aborted`] and the join is
    /// consumed.
    pub fn abort(&self, message: Option<&str>) -> &Self {
        let wait = { self.active.lock().take() };
        if let Some(mut wait) = wait {
            let error = WaitError::Aborted(message.unwrap_or(DEFAULT_ABORT_MESSAGE).to_string());
            debug!(generation = %wait.id, "join aborted");
            for promise in &wait.tracked {
                if promise.is_pending() {
                    promise.abort(error.clone());
                }
            }
            wait.clear_timers();
            wait.composite.reject(error);
        }
        self
    }

    /// Returns `true` while a join is open and unsettled.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|w| w.composite.is_pending())
    }
}

impl std::fmt::Debug for Deferrable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.active.lock();
        match active.as_ref() {
            Some(wait) => f
                .debug_struct("Deferrable")
                .field("generation", &wait.id)
                .field("operations", &wait.slots.len())
                .finish(),
            None => f.debug_struct("Deferrable").field("idle", &true).finish(),
        }
    }
}
