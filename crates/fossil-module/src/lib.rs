//! Module tree for the Fossil composition runtime.
//!
//! An application is a tree of [`Module`]s. Each module composes three
//! capabilities, owned explicitly rather than mixed in:
//!
//! | Capability | Type | Role |
//! |------------|------|------|
//! | observable | [`fossil_event::Bus`] | talk to services and children |
//! | deferrable | [`fossil_wait::Deferrable`] | aggregate async lifecycle work |
//! | startable | [`Phase`] state machine | start / standby / stop |
//!
//! # Tree Protocol
//!
//! ```text
//! parent.connect("sidebar", &child)
//!     │
//!     ├─ disconnect any previous occupant of "sidebar"
//!     ├─ child's buffered parent traffic replays onto a scoped facade
//!     ├─ pending deep services propagate into the child's subtree
//!     ├─ child auto-starts if parent runs and child opted in
//!     ├─ child emits  do:connect:to:parent   [parent, id, child]
//!     └─ parent emits on:child:connect       [child, id, parent]
//! ```
//!
//! `disconnect` mirrors this: deep services detach from the departing
//! subtree, the child's parent reference is stubbed back to a fresh
//! buffer, and the symmetric pair of events fires.
//!
//! # Services
//!
//! A [`Service`] is a pluggable behavior attached with
//! [`Module::use_service`] and removed with [`Module::dispose`]. A
//! service marked [`deep`](Service::deep) propagates to every present
//! and future descendant: each module keeps a pending-deep list that
//! `connect` consults, so one `use_service` call on the root covers
//! children connected long after.
//!
//! # Structural Events
//!
//! Modules never perform routing or rendering themselves; they emit
//! the `do:*` requests listed in [`events`] and whichever service is
//! listening does the work.

mod error;
pub mod events;
mod lifecycle;
mod module;
mod service;
mod view;

pub use error::ModuleError;
pub use lifecycle::Phase;
pub use module::{ErrorHook, Module, ModuleBuilder};
pub use service::{Service, ServiceRef};
pub use view::View;
