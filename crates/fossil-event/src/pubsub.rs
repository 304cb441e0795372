//! Capability-scoped bus facade.

use crate::bus::BusInner;
use crate::{Args, BusError, Emitted, Handler, Verb};
use fossil_types::{BusId, SubscriptionId};
use std::fmt;
use std::sync::{Arc, Weak};

/// A restricted handle to a [`Bus`](crate::Bus).
///
/// Exposes only the bus verbs, so a collaborator can be given the
/// ability to talk on a bus without owning it. The handle is weak: it
/// does not keep the bus alive, and every verb reports
/// [`BusError::Closed`] once the bus is gone.
///
/// This is the type a module hands to its children as their parent
/// reference; a disconnected child's facade goes dead instead of
/// leaking the old parent.
#[derive(Clone)]
pub struct PubSub {
    inner: Weak<BusInner>,
}

impl PubSub {
    pub(crate) fn new(inner: Weak<BusInner>) -> Self {
        Self { inner }
    }

    fn live(&self) -> Result<Arc<BusInner>, BusError> {
        self.inner.upgrade().ok_or(BusError::Closed)
    }

    /// Returns `true` while the underlying bus is alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Returns the underlying bus identity, if still alive.
    #[must_use]
    pub fn bus_id(&self) -> Option<BusId> {
        self.inner.upgrade().map(|inner| inner.id())
    }

    pub(crate) fn subscribe_as(
        &self,
        verb: Verb,
        event: String,
        handler: Handler,
        once: bool,
    ) -> Result<SubscriptionId, BusError> {
        Ok(self.live()?.subscribe(verb, event, handler, once))
    }

    /// Subscribes a listener on the underlying bus.
    pub fn on(&self, event: impl Into<String>, handler: Handler) -> Result<SubscriptionId, BusError> {
        self.subscribe_as(Verb::On, event.into(), handler, false)
    }

    /// Subscribes a listener removed after its first delivery.
    pub fn once(
        &self,
        event: impl Into<String>,
        handler: Handler,
    ) -> Result<SubscriptionId, BusError> {
        self.subscribe_as(Verb::Once, event.into(), handler, true)
    }

    /// Removes every listener for an event name.
    pub fn off(&self, event: &str) -> Result<(), BusError> {
        self.live()?.remove_event(event);
        Ok(())
    }

    /// Removes a single subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, BusError> {
        Ok(self.live()?.remove_sub(id))
    }

    /// Emits on the underlying bus, modifier chain included.
    pub fn emit(&self, event: &str, args: Args) -> Result<Emitted, BusError> {
        let inner = self.live()?;
        Ok(inner.emit(event, &args))
    }
}

impl fmt::Debug for PubSub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bus_id() {
            Some(id) => write!(f, "PubSub({id})"),
            None => f.write_str("PubSub(closed)"),
        }
    }
}
