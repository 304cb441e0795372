//! Event system for the Fossil composition runtime.
//!
//! Everything in a Fossil application talks over an event bus: modules
//! reach their services, children reach their parents, and lifecycle
//! transitions are announced as plain events. This crate provides that
//! bus plus the two pieces that make it composable:
//!
//! - **Event modifiers**: an ordered chain of pattern rules consulted
//!   before dispatch. A matching rule strips its prefix from the event
//!   name and, for emissions, substitutes its own delivery strategy.
//!   Two strategies ship built in: `one!` (first responder only) and
//!   `map!` (deliver to all, gather the replies).
//! - **Buffering**: a record/replay stand-in ([`EventBuffer`]) used by
//!   a module whose parent bus does not exist yet. Calls are logged in
//!   FIFO order and replayed once the real bus is available.
//!
//! # Dispatch Flow
//!
//! ```text
//! emit("one!config:get", args)
//!     │
//!     ▼ (scan modifiers in registration order, first match wins)
//! modifier "one" matches, name rewritten to "config:get"
//!     │
//!     ▼
//! deliver to FIRST listener of "config:get"
//!     │
//!     ▼
//! Emitted::First(listener's return value)
//! ```
//!
//! Without a matching modifier, an emission is a plain broadcast to
//! every listener in subscription order and returns the delivered
//! count.
//!
//! # Capability Scoping
//!
//! [`Bus::pubsub`] hands out a [`PubSub`] facade: a weak, verb-only
//! handle that lets a collaborator use the bus without owning it. A
//! facade outliving its bus reports [`BusError::Closed`] instead of
//! keeping the bus alive.
//!
//! # Example
//!
//! ```
//! use fossil_event::{handler, Arg, Bus, Emitted};
//!
//! let bus = Bus::new();
//! bus.on("greet", handler(|_args| Some(Arg::json("hello"))));
//! bus.on("greet", handler(|_args| Some(Arg::json("bonjour"))));
//!
//! // Broadcast: both listeners run.
//! assert!(matches!(bus.emit("greet", vec![]), Emitted::Delivered(2)));
//!
//! // First responder only.
//! let Emitted::First(Some(reply)) = bus.emit("one!greet", vec![]) else {
//!     panic!("expected a single reply");
//! };
//! assert_eq!(reply.as_json().unwrap(), "hello");
//! ```

mod arg;
mod buffer;
mod bus;
mod error;
mod modifier;
mod pubsub;

pub use arg::{handler, Arg, Args, Handler};
pub use buffer::EventBuffer;
pub use bus::{Bus, Emitted, EventMap};
pub use error::BusError;
pub use modifier::{EventModifier, Matcher, ModifierAction, Verb, VerbSet};
pub use pubsub::PubSub;
