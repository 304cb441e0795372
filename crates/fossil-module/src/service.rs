//! The pluggable service contract.

use crate::Module;
use fossil_event::Arg;
use std::sync::Arc;

/// Shared service handle, as stored in a module's registry.
pub type ServiceRef = Arc<dyn Service>;

/// A pluggable behavior attachable to modules.
///
/// Services are stateless with respect to the tree: `attach`/`detach`
/// receive the module (and, during deep propagation, its parent) and
/// do whatever wiring the service is about, typically subscribing
/// listeners on the module's bus. Whatever state a service owns, a
/// routing table or a session store, lives inside the service itself.
///
/// # Attach Algorithm
///
/// [`Module::use_service`] runs the same steps for every service:
///
/// 1. register the service under its id (the registry entry is also
///    the back-reference an application reads via
///    [`Module::service`]),
/// 2. subscribe each [`exposed`](Self::exposed) operation on the
///    module's bus, answered by [`call`](Self::call), so
///    `emit("one!<op>")` is a request/response round trip,
/// 3. invoke [`attach`](Self::attach),
/// 4. for a [`deep`](Self::deep) service, record it in the module's
///    pending-deep list and recurse over the current children; future
///    children are covered because `connect` consults that list.
///
/// [`Module::dispose`] reverses the steps in reverse order.
///
/// Exposure is host-local: deep propagation delivers `attach`/`detach`
/// to descendants, and a service that wants per-descendant listeners
/// subscribes them itself in `attach`.
pub trait Service: Send + Sync {
    /// The service's name, used in structural events and logs.
    fn name(&self) -> &str;

    /// Called when the service is attached to a module.
    ///
    /// `parent` is the module's parent during deep propagation, `None`
    /// for the host module itself.
    fn attach(&self, module: &Module, parent: Option<&Module>) {
        let _ = (module, parent);
    }

    /// Called when the service is detached from a module.
    fn detach(&self, module: &Module, parent: Option<&Module>) {
        let _ = (module, parent);
    }

    /// Whether the service propagates through the whole subtree,
    /// present and future. Defaults to `false`.
    fn deep(&self) -> bool {
        false
    }

    /// Operation names answered by [`call`](Self::call), subscribed on
    /// the host module's bus at attach time. Defaults to none.
    fn exposed(&self) -> &[&str] {
        &[]
    }

    /// Answers an exposed operation. Defaults to no answer.
    fn call(&self, op: &str, args: &[Arg]) -> Option<Arg> {
        let _ = (op, args);
        None
    }
}
