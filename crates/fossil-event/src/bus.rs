//! The observable event bus.
//!
//! A [`Bus`] routes named events to listeners. Listeners for a given
//! event fire in subscription order; dispatch snapshots the listener
//! list first, so a listener may subscribe or unsubscribe mid-emission
//! without corrupting the current delivery round.
//!
//! Every verb consults the modifier chain before acting (see
//! [`crate::modifier`]). The two built-in modifiers installed on every
//! bus, both restricted to emissions:
//!
//! | Prefix | Strategy | Result |
//! |--------|----------|--------|
//! | `one!` | first responder | [`Emitted::First`] |
//! | `map!` | deliver to all, gather replies | [`Emitted::Gathered`] |

use crate::{Arg, Args, BusError, EventModifier, Handler, Matcher, ModifierAction, PubSub, Verb, VerbSet};
use fossil_types::{BusId, SubscriptionId};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Declarative event wiring: event name to handler, subscribed in
/// order at construction time.
pub type EventMap = Vec<(String, Handler)>;

/// Outcome of an emission.
#[derive(Debug)]
pub enum Emitted {
    /// Plain broadcast; carries the number of listeners reached.
    Delivered(usize),
    /// First-responder delivery (`one!`); carries that listener's
    /// return value, or `None` when nobody was subscribed.
    First(Option<Arg>),
    /// Gather delivery (`map!`); carries every listener's return value
    /// in subscription order, with JSON null for listeners that
    /// returned nothing.
    Gathered(Vec<Arg>),
}

impl Emitted {
    /// Listener count of a plain broadcast, 0 for the other shapes.
    #[must_use]
    pub fn delivered(&self) -> usize {
        match self {
            Self::Delivered(count) => *count,
            _ => 0,
        }
    }

    /// Consumes a first-responder outcome.
    #[must_use]
    pub fn into_first(self) -> Option<Arg> {
        match self {
            Self::First(value) => value,
            _ => None,
        }
    }

    /// Consumes a gather outcome.
    #[must_use]
    pub fn into_gathered(self) -> Vec<Arg> {
        match self {
            Self::Gathered(values) => values,
            _ => Vec::new(),
        }
    }
}

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
    once: bool,
}

struct ForeignSub {
    bus: PubSub,
    sub: SubscriptionId,
}

pub(crate) struct BusInner {
    id: BusId,
    subs: Mutex<HashMap<String, Vec<Subscription>>>,
    modifiers: Mutex<Vec<EventModifier>>,
    foreign: Mutex<Vec<ForeignSub>>,
}

impl BusInner {
    pub(crate) fn id(&self) -> BusId {
        self.id
    }

    fn modifier_hit(&self, verb: Verb, event: &str) -> Option<(ModifierAction, String)> {
        let modifiers = self.modifiers.lock();
        modifiers
            .iter()
            .find_map(|m| m.rewrite(verb, event).map(|rewritten| (m.action(), rewritten)))
    }

    /// Name rewriting for non-emit verbs: a matching modifier strips
    /// its prefix, then normal behavior proceeds.
    fn rewritten(&self, verb: Verb, event: String) -> String {
        match self.modifier_hit(verb, &event) {
            Some((_, rewritten)) => rewritten,
            None => event,
        }
    }

    pub(crate) fn subscribe(
        &self,
        verb: Verb,
        event: String,
        handler: Handler,
        once: bool,
    ) -> SubscriptionId {
        let event = self.rewritten(verb, event);
        let id = SubscriptionId::new();
        self.subs
            .lock()
            .entry(event)
            .or_default()
            .push(Subscription { id, handler, once });
        id
    }

    pub(crate) fn remove_event(&self, event: &str) {
        let event = self.rewritten(Verb::Off, event.to_string());
        self.subs.lock().remove(&event);
    }

    pub(crate) fn remove_sub(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subs.lock();
        let mut found = false;
        subs.retain(|_, list| {
            let before = list.len();
            list.retain(|s| s.id != id);
            found |= list.len() < before;
            !list.is_empty()
        });
        found
    }

    fn remove_fired(&self, event: &str, fired: &[SubscriptionId]) {
        if fired.is_empty() {
            return;
        }
        let mut subs = self.subs.lock();
        let now_empty = match subs.get_mut(event) {
            Some(list) => {
                list.retain(|s| !fired.contains(&s.id));
                list.is_empty()
            }
            None => false,
        };
        if now_empty {
            subs.remove(event);
        }
    }

    /// Snapshot of the current listeners for an event. Dispatch always
    /// iterates a snapshot so re-entrant (un)subscription cannot
    /// corrupt the round in flight.
    fn snapshot(&self, event: &str) -> Vec<(SubscriptionId, Handler, bool)> {
        self.subs
            .lock()
            .get(event)
            .map(|list| list.iter().map(|s| (s.id, s.handler.clone(), s.once)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn emit(self: &Arc<Self>, event: &str, args: &[Arg]) -> Emitted {
        if let Some((action, rewritten)) = self.modifier_hit(Verb::Emit, event) {
            trace!(bus = %self.id, event, rewritten = %rewritten, "modifier intercepted emit");
            let bus = Bus {
                inner: Arc::clone(self),
            };
            return action(&bus, Verb::Emit, &rewritten, args);
        }
        self.deliver(event, args)
    }

    pub(crate) fn deliver(&self, event: &str, args: &[Arg]) -> Emitted {
        let listeners = self.snapshot(event);
        let mut fired_once = Vec::new();
        for (id, handler, once) in &listeners {
            let mut f = handler.lock();
            (*f)(args);
            if *once {
                fired_once.push(*id);
            }
        }
        self.remove_fired(event, &fired_once);
        trace!(bus = %self.id, event, delivered = listeners.len(), "emit");
        Emitted::Delivered(listeners.len())
    }

    pub(crate) fn deliver_first(&self, event: &str, args: &[Arg]) -> Emitted {
        let first = {
            self.subs
                .lock()
                .get(event)
                .and_then(|list| list.first())
                .map(|s| (s.id, s.handler.clone(), s.once))
        };
        match first {
            None => Emitted::First(None),
            Some((id, handler, once)) => {
                let value = {
                    let mut f = handler.lock();
                    (*f)(args)
                };
                if once {
                    self.remove_fired(event, &[id]);
                }
                Emitted::First(value)
            }
        }
    }

    pub(crate) fn deliver_gathered(&self, event: &str, args: &[Arg]) -> Emitted {
        let listeners = self.snapshot(event);
        let mut fired_once = Vec::new();
        let mut values = Vec::with_capacity(listeners.len());
        for (id, handler, once) in &listeners {
            let value = {
                let mut f = handler.lock();
                (*f)(args)
            };
            values.push(value.unwrap_or(Arg::Json(Value::Null)));
            if *once {
                fired_once.push(*id);
            }
        }
        self.remove_fired(event, &fired_once);
        Emitted::Gathered(values)
    }
}

/// The observable event bus.
///
/// Cheap to clone; clones share the same listener registry. For a
/// restricted handle that does not keep the bus alive, use
/// [`pubsub`](Self::pubsub).
#[derive(Clone)]
pub struct Bus {
    pub(crate) inner: Arc<BusInner>,
}

impl Bus {
    /// Creates a bus with the `one!` and `map!` modifiers installed.
    #[must_use]
    pub fn new() -> Self {
        let bus = Self {
            inner: Arc::new(BusInner {
                id: BusId::new(),
                subs: Mutex::new(HashMap::new()),
                modifiers: Mutex::new(Vec::new()),
                foreign: Mutex::new(Vec::new()),
            }),
        };
        bus.add_modifier(
            "one",
            VerbSet::only([Verb::Emit]),
            Arc::new(|bus, _verb, event, args| bus.emit_first(event, args)),
        );
        bus.add_modifier(
            "map",
            VerbSet::only([Verb::Emit]),
            Arc::new(|bus, _verb, event, args| bus.emit_gathered(event, args)),
        );
        bus
    }

    /// Returns the bus identity.
    #[must_use]
    pub fn id(&self) -> BusId {
        self.inner.id()
    }

    /// Subscribes a listener. Listeners fire in subscription order.
    pub fn on(&self, event: impl Into<String>, handler: Handler) -> SubscriptionId {
        self.inner.subscribe(Verb::On, event.into(), handler, false)
    }

    /// Subscribes a listener that is removed after its first delivery.
    pub fn once(&self, event: impl Into<String>, handler: Handler) -> SubscriptionId {
        self.inner.subscribe(Verb::Once, event.into(), handler, true)
    }

    /// Removes every listener for an event name.
    pub fn off(&self, event: &str) {
        self.inner.remove_event(event);
    }

    /// Removes a single subscription. Returns `true` if it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove_sub(id)
    }

    /// Emits an event.
    ///
    /// The modifier chain is consulted first; without a match this is a
    /// broadcast to every listener in subscription order.
    pub fn emit(&self, event: &str, args: Args) -> Emitted {
        self.inner.emit(event, &args)
    }

    /// Delivers directly to the first listener, bypassing the modifier
    /// chain. This is the `one!` strategy's entry point.
    pub fn emit_first(&self, event: &str, args: &[Arg]) -> Emitted {
        self.inner.deliver_first(event, args)
    }

    /// Delivers to every listener and gathers their replies, bypassing
    /// the modifier chain. This is the `map!` strategy's entry point.
    pub fn emit_gathered(&self, event: &str, args: &[Arg]) -> Emitted {
        self.inner.deliver_gathered(event, args)
    }

    /// Registers an event modifier at the end of the chain.
    ///
    /// Modifiers are tried in registration order and the first match
    /// wins, so earlier registrations shadow later ones.
    pub fn add_modifier(
        &self,
        matcher: impl Into<Matcher>,
        verbs: VerbSet,
        action: ModifierAction,
    ) -> &Self {
        let modifier = EventModifier::new(matcher.into(), verbs, action);
        self.inner.modifiers.lock().push(modifier);
        self
    }

    /// Removes a modifier by matcher. Comparison is by normalized
    /// pattern text. Returns `true` if one was removed.
    pub fn remove_modifier(&self, matcher: impl Into<Matcher>) -> bool {
        let text = matcher.into().into_regex().as_str().to_string();
        let mut modifiers = self.inner.modifiers.lock();
        let before = modifiers.len();
        modifiers.retain(|m| m.pattern_text() != text);
        modifiers.len() < before
    }

    /// Re-emits every `src` emission as `dest` with the same arguments.
    pub fn forward(&self, src: impl Into<String>, dest: impl Into<String>) -> SubscriptionId {
        let dest = dest.into();
        let weak = Arc::downgrade(&self.inner);
        self.on(
            src,
            crate::handler(move |args: &[Arg]| {
                if let Some(inner) = weak.upgrade() {
                    inner.emit(&dest, args);
                }
                None
            }),
        )
    }

    /// Subscribes on another bus, tracking the subscription against
    /// this bus for bulk teardown via [`stop_listening`](Self::stop_listening).
    pub fn listen_to(
        &self,
        other: &PubSub,
        event: impl Into<String>,
        handler: Handler,
    ) -> Result<SubscriptionId, BusError> {
        let sub = other.subscribe_as(Verb::ListenTo, event.into(), handler, false)?;
        self.track(other, sub)
    }

    /// Once-variant of [`listen_to`](Self::listen_to).
    pub fn listen_to_once(
        &self,
        other: &PubSub,
        event: impl Into<String>,
        handler: Handler,
    ) -> Result<SubscriptionId, BusError> {
        let sub = other.subscribe_as(Verb::ListenToOnce, event.into(), handler, true)?;
        self.track(other, sub)
    }

    fn track(&self, other: &PubSub, sub: SubscriptionId) -> Result<SubscriptionId, BusError> {
        self.inner.foreign.lock().push(ForeignSub {
            bus: other.clone(),
            sub,
        });
        Ok(sub)
    }

    /// Removes every subscription this bus placed on other buses.
    /// Buses that are already gone are skipped.
    pub fn stop_listening(&self) {
        let drained: Vec<ForeignSub> = std::mem::take(&mut *self.inner.foreign.lock());
        for foreign in drained {
            let _ = foreign.bus.unsubscribe(foreign.sub);
        }
    }

    /// Subscribes a declarative event map in order.
    pub fn wire(&self, events: EventMap) -> &Self {
        for (event, handler) in events {
            self.on(event, handler);
        }
        self
    }

    /// Returns a capability-scoped facade exposing only the bus verbs.
    ///
    /// The facade holds a weak reference: it reports
    /// [`BusError::Closed`] once the bus is gone instead of keeping it
    /// alive.
    #[must_use]
    pub fn pubsub(&self) -> PubSub {
        PubSub::new(Arc::downgrade(&self.inner))
    }

    /// Wires a declarative event map onto this bus, then returns a
    /// facade. The facade-time analog of construction-time [`wire`](Self::wire).
    #[must_use]
    pub fn pubsub_wired(&self, events: EventMap) -> PubSub {
        self.wire(events);
        self.pubsub()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("id", &self.inner.id)
            .field("events", &self.inner.subs.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler;
    use serde_json::json;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let make = move |tag: &str| {
            let log = Arc::clone(&log2);
            let tag = tag.to_string();
            handler(move |_args: &[Arg]| {
                log.lock().push(tag.clone());
                None
            })
        };
        (log, make)
    }

    #[test]
    fn broadcast_in_subscription_order() {
        let bus = Bus::new();
        let (log, make) = recorder();
        bus.on("evt", make("a"));
        bus.on("evt", make("b"));
        bus.on("evt", make("c"));

        let out = bus.emit("evt", vec![]);
        assert_eq!(out.delivered(), 3);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn emit_without_listeners() {
        let bus = Bus::new();
        assert_eq!(bus.emit("nobody", vec![]).delivered(), 0);
    }

    #[test]
    fn once_fires_exactly_once() {
        let bus = Bus::new();
        let (log, make) = recorder();
        bus.once("evt", make("once"));
        bus.on("evt", make("always"));

        bus.emit("evt", vec![]);
        bus.emit("evt", vec![]);
        assert_eq!(*log.lock(), vec!["once", "always", "always"]);
    }

    #[test]
    fn off_removes_all_listeners() {
        let bus = Bus::new();
        let (log, make) = recorder();
        bus.on("evt", make("a"));
        bus.on("evt", make("b"));
        bus.off("evt");

        assert_eq!(bus.emit("evt", vec![]).delivered(), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn unsubscribe_removes_one() {
        let bus = Bus::new();
        let (log, make) = recorder();
        let keep = bus.on("evt", make("keep"));
        let drop = bus.on("evt", make("drop"));

        assert!(bus.unsubscribe(drop));
        assert!(!bus.unsubscribe(drop));
        bus.emit("evt", vec![]);
        assert_eq!(*log.lock(), vec!["keep"]);
        assert!(bus.unsubscribe(keep));
    }

    #[test]
    fn one_delivers_to_first_listener_only() {
        let bus = Bus::new();
        let (log, make) = recorder();
        bus.on("foo", {
            let log = Arc::clone(&log);
            handler(move |_args| {
                log.lock().push("first".into());
                Some(Arg::json(1))
            })
        });
        bus.on("foo", make("second"));

        let out = bus.emit("one!foo", vec![]);
        let value = out.into_first().unwrap();
        assert_eq!(value.as_json().unwrap(), &json!(1));
        assert_eq!(*log.lock(), vec!["first"]);
    }

    #[test]
    fn one_with_no_listeners_is_none() {
        let bus = Bus::new();
        assert!(bus.emit("one!nobody", vec![]).into_first().is_none());
    }

    #[test]
    fn map_gathers_in_subscription_order() {
        let bus = Bus::new();
        for n in 1..=3 {
            bus.on("foo", handler(move |_args| Some(Arg::json(n))));
        }
        bus.on("foo", handler(|_args| None));

        let values = bus.emit("map!foo", vec![]).into_gathered();
        let json: Vec<_> = values.iter().map(|v| v.as_json().unwrap().clone()).collect();
        assert_eq!(json, vec![json!(1), json!(2), json!(3), json!(null)]);
    }

    #[test]
    fn modifier_precedence_first_registration_wins() {
        let bus = Bus::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let hits = Arc::clone(&hits);
            let tag = tag.to_string();
            bus.add_modifier(
                "x",
                VerbSet::only([Verb::Emit]),
                Arc::new(move |_bus, _verb, _event, _args| {
                    hits.lock().push(tag.clone());
                    Emitted::Delivered(0)
                }),
            );
        }

        bus.emit("x!y", vec![]);
        assert_eq!(*hits.lock(), vec!["a"]);
    }

    #[test]
    fn remove_modifier_by_normalized_text() {
        let bus = Bus::new();
        bus.add_modifier(
            "gather",
            VerbSet::only([Verb::Emit]),
            Arc::new(|bus, _verb, event, args| bus.emit_gathered(event, args)),
        );

        assert!(bus.remove_modifier("gather"));
        assert!(!bus.remove_modifier("gather"));

        // Back to plain broadcast: the name is no longer rewritten.
        let (log, make) = recorder();
        bus.on("gather!x", make("raw"));
        bus.emit("gather!x", vec![]);
        assert_eq!(*log.lock(), vec!["raw"]);
    }

    #[test]
    fn builtins_survive_foreign_removal() {
        let bus = Bus::new();
        assert!(!bus.remove_modifier("nothing"));
        bus.on("foo", handler(|_args| Some(Arg::json("hi"))));
        assert!(bus.emit("one!foo", vec![]).into_first().is_some());
    }

    #[test]
    fn forward_re_emits_with_same_args() {
        let bus = Bus::new();
        let seen = Arc::new(Mutex::new(None));
        bus.forward("src", "dest");
        bus.on("dest", {
            let seen = Arc::clone(&seen);
            handler(move |args| {
                *seen.lock() = args.first().and_then(Arg::as_json).cloned();
                None
            })
        });

        bus.emit("src", vec![Arg::json("payload")]);
        assert_eq!(seen.lock().clone(), Some(json!("payload")));
    }

    #[test]
    fn listen_to_and_stop_listening() {
        let listener = Bus::new();
        let source = Bus::new();
        let (log, make) = recorder();

        listener
            .listen_to(&source.pubsub(), "evt", make("heard"))
            .unwrap();
        source.emit("evt", vec![]);
        assert_eq!(*log.lock(), vec!["heard"]);

        listener.stop_listening();
        source.emit("evt", vec![]);
        assert_eq!(*log.lock(), vec!["heard"]);
    }

    #[test]
    fn listen_to_once() {
        let listener = Bus::new();
        let source = Bus::new();
        let (log, make) = recorder();

        listener
            .listen_to_once(&source.pubsub(), "evt", make("heard"))
            .unwrap();
        source.emit("evt", vec![]);
        source.emit("evt", vec![]);
        assert_eq!(*log.lock(), vec!["heard"]);
    }

    #[test]
    fn reentrant_subscription_does_not_affect_current_round() {
        let bus = Bus::new();
        let (log, make) = recorder();
        let bus2 = bus.clone();
        let late = make("late");
        bus.on("evt", {
            let log = Arc::clone(&log);
            handler(move |_args| {
                log.lock().push("outer".into());
                bus2.on("evt", late.clone());
                None
            })
        });

        assert_eq!(bus.emit("evt", vec![]).delivered(), 1);
        assert_eq!(*log.lock(), vec!["outer"]);

        bus.emit("evt", vec![]);
        assert_eq!(*log.lock(), vec!["outer", "outer", "late"]);
    }

    #[test]
    fn wire_subscribes_event_map() {
        let bus = Bus::new();
        let (log, make) = recorder();
        bus.wire(vec![
            ("a".to_string(), make("a")),
            ("b".to_string(), make("b")),
        ]);

        bus.emit("a", vec![]);
        bus.emit("b", vec![]);
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }
}
