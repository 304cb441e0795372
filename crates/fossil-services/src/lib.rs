//! Concrete services for the Fossil composition runtime.
//!
//! Each type here is an ordinary implementation of the
//! [`Service`](fossil_module::Service) contract; the module tree's
//! generic attach/detach algorithm does the propagation, these types
//! do the domain work.
//!
//! | Service | Deep | Listens for | Answers |
//! |---------|------|-------------|---------|
//! | [`RoutingService`] | yes | `do:route:register`, `do:route:navigate` | `one!route:resolve` |
//! | [`SessionService`] | no | – | `one!session:get/set/take/clear` |
//! | [`CanvasService`] | yes | `do:view:attach` | – |
//! | [`RelayService`] | optional | configured forwards | – |
//!
//! # Example
//!
//! ```
//! use fossil_module::Module;
//! use fossil_services::RoutingService;
//! use std::sync::Arc;
//!
//! let shell = Module::new("shell");
//! shell.use_service("routing", Arc::new(RoutingService::new())).unwrap();
//!
//! // Modules connected later are covered: the routing service is deep.
//! let inbox = Module::new("inbox");
//! shell.connect("inbox", &inbox).unwrap();
//! inbox.route("inbox/:id", Some("open-message"), None);
//! inbox.navigate("inbox/42");
//! ```

mod canvas;
mod error;
mod relay;
mod routing;
mod session;

pub use canvas::CanvasService;
pub use error::ServiceError;
pub use relay::RelayService;
pub use routing::RoutingService;
pub use session::SessionService;
