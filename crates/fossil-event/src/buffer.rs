//! Record/replay stand-in for a not-yet-available bus.

use crate::{Arg, Args, BusError, Handler, PubSub};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

enum BufferedCall {
    Subscribe {
        event: String,
        handler: Handler,
        once: bool,
    },
    Off {
        event: String,
    },
    Emit {
        event: String,
        args: Args,
    },
}

/// A bus stand-in that records calls instead of dispatching them.
///
/// A module that has not been connected to a parent yet still wants to
/// wire its parent-facing events and emit upward. The buffer accepts
/// that traffic and [`replay`](Self::replay)s it, in FIFO order, onto
/// the real bus once one exists.
///
/// One rewrite happens at replay: [`Arg::SelfRef`] arguments recorded
/// in emissions are substituted with a handle to the replay target, so
/// self-references recorded while detached rebind to the live bus.
///
/// Clones share the same log; a buffer is consumed by replay.
#[derive(Clone, Default)]
pub struct EventBuffer {
    calls: Arc<Mutex<Vec<BufferedCall>>>,
}

impl EventBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a subscription.
    pub fn on(&self, event: impl Into<String>, handler: Handler) {
        self.calls.lock().push(BufferedCall::Subscribe {
            event: event.into(),
            handler,
            once: false,
        });
    }

    /// Records a once-subscription.
    pub fn once(&self, event: impl Into<String>, handler: Handler) {
        self.calls.lock().push(BufferedCall::Subscribe {
            event: event.into(),
            handler,
            once: true,
        });
    }

    /// Records an unsubscribe-by-name.
    pub fn off(&self, event: impl Into<String>) {
        self.calls.lock().push(BufferedCall::Off {
            event: event.into(),
        });
    }

    /// Records an emission.
    pub fn emit(&self, event: impl Into<String>, args: Args) {
        self.calls.lock().push(BufferedCall::Emit {
            event: event.into(),
            args,
        });
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Replays the log onto `target` in recording order and drains it.
    ///
    /// Returns the number of calls replayed.
    pub fn replay(&self, target: &PubSub) -> Result<usize, BusError> {
        let calls: Vec<BufferedCall> = std::mem::take(&mut *self.calls.lock());
        let count = calls.len();
        for call in calls {
            match call {
                BufferedCall::Subscribe { event, handler, once } => {
                    if once {
                        target.once(event, handler)?;
                    } else {
                        target.on(event, handler)?;
                    }
                }
                BufferedCall::Off { event } => target.off(&event)?,
                BufferedCall::Emit { event, args } => {
                    let args = args
                        .into_iter()
                        .map(|arg| match arg {
                            Arg::SelfRef => Arg::Pubsub(target.clone()),
                            other => other,
                        })
                        .collect();
                    target.emit(&event, args)?;
                }
            }
        }
        if count > 0 {
            debug!(replayed = count, onto = ?target, "event buffer replayed");
        }
        Ok(count)
    }
}

impl fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBuffer")
            .field("buffered", &self.len())
            .finish()
    }
}
