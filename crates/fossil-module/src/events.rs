//! Structural event names.
//!
//! These names are the protocol between modules and their
//! collaborators. A module emits `do:*` requests; services subscribed
//! to the module's bus perform the actual work. The `on:*` names are
//! notifications emitted alongside tree and service mutations.
//!
//! | Event | Emitted on | Args |
//! |-------|-----------|------|
//! | [`DO_ROUTE_NAVIGATE`] | module | module, path, .. |
//! | [`DO_ROUTE_REGISTER`] | module | module, path, name?, callback? |
//! | [`DO_VIEW_RENDER`] | module | module, view, .. |
//! | [`DO_VIEW_ATTACH`] | module | module, view, .. |
//! | [`DO_CONNECT_TO_PARENT`] | child | parent, id, child, .. |
//! | [`ON_CHILD_CONNECT`] | parent | child, id, parent, .. |
//! | [`DO_DISCONNECT_FROM_PARENT`] | child | parent, id, child, .. |
//! | [`ON_CHILD_DISCONNECT`] | parent | child, id, parent, .. |
//! | [`DO_USE_MODULE`] | module | module, id, service name, .. |
//! | [`ON_SERVICE_USE`] | module | service name, id, module, .. |
//! | [`DO_DISPOSE_MODULE`] | module | module, id, service name, .. |
//! | [`ON_SERVICE_DISPOSE`] | module | service name, id, module, .. |
//! | [`START_FIRST`], [`START`], [`STANDBY`], [`STOP`] | module | module |
//!
//! Module and parent references travel as downcastable handles
//! ([`fossil_event::Arg::Handle`] carrying a [`Module`](crate::Module));
//! services travel by name, since the module's registry holds the
//! object itself.

/// Navigation request.
pub const DO_ROUTE_NAVIGATE: &str = "do:route:navigate";
/// Route registration request.
pub const DO_ROUTE_REGISTER: &str = "do:route:register";
/// Render request.
pub const DO_VIEW_RENDER: &str = "do:view:render";
/// Attach-to-display request.
pub const DO_VIEW_ATTACH: &str = "do:view:attach";

/// Emitted on a child that just got a parent.
pub const DO_CONNECT_TO_PARENT: &str = "do:connect:to:parent";
/// Emitted on a parent that gained a child.
pub const ON_CHILD_CONNECT: &str = "on:child:connect";
/// Emitted on a child that lost its parent.
pub const DO_DISCONNECT_FROM_PARENT: &str = "do:disconnect:from:parent";
/// Emitted on a parent that lost a child.
pub const ON_CHILD_DISCONNECT: &str = "on:child:disconnect";

/// Emitted on a module when a service is attached.
pub const DO_USE_MODULE: &str = "do:use:module";
/// Notification counterpart of [`DO_USE_MODULE`].
pub const ON_SERVICE_USE: &str = "on:service:use";
/// Emitted on a module when a service is detached.
pub const DO_DISPOSE_MODULE: &str = "do:dispose:module";
/// Notification counterpart of [`DO_DISPOSE_MODULE`].
pub const ON_SERVICE_DISPOSE: &str = "on:service:dispose";

/// One-time event preceding the first `start` of an epoch.
pub const START_FIRST: &str = "start:first";
/// Lifecycle transition into running.
pub const START: &str = "start";
/// Lifecycle transition out of running.
pub const STANDBY: &str = "standby";
/// Final lifecycle transition of an epoch.
pub const STOP: &str = "stop";
