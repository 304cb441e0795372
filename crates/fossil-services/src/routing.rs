//! Route registration and navigation.
//!
//! A deep service: it listens for `do:route:register` and
//! `do:route:navigate` on every module in its subtree, so any module
//! can declare routes and request navigation through the
//! [`Module::route`](fossil_module::Module::route) and
//! [`Module::navigate`](fossil_module::Module::navigate) wrappers.
//!
//! Paths are literal segments with `:name` captures:
//!
//! ```text
//! "inbox/:id"  matches  "inbox/42"  with params { "id": "42" }
//! ```
//!
//! Routes are tried in registration order; the first match wins. A
//! matched route's callback (if registered) is invoked with the
//! captured parameters as a JSON object.

use fossil_event::{handler, Arg, Handler};
use fossil_module::{events, Module, Service};
use fossil_types::SubscriptionId;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

enum Segment {
    Literal(String),
    Param(String),
}

fn parse(path: &str) -> Vec<Segment> {
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| match part.strip_prefix(':') {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(part.to_string()),
        })
        .collect()
}

struct Route {
    segments: Vec<Segment>,
    name: Option<String>,
    callback: Option<Handler>,
}

impl Route {
    fn matches(&self, parts: &[&str]) -> Option<Value> {
        if self.segments.len() != parts.len() {
            return None;
        }
        let mut params = serde_json::Map::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), Value::String((*part).to_string()));
                }
            }
        }
        Some(Value::Object(params))
    }
}

struct RoutingInner {
    routes: Mutex<Vec<Route>>,
    subs: Mutex<HashMap<Uuid, Vec<SubscriptionId>>>,
}

impl RoutingInner {
    fn register_from_args(&self, args: &[Arg]) {
        let Some(path) = args.get(1).and_then(Arg::as_str) else {
            warn!("route registration without a path");
            return;
        };
        let name = args.get(2).and_then(Arg::as_str).map(str::to_string);
        let callback = args.get(3).and_then(Arg::as_callback);
        debug!(path, name = name.as_deref().unwrap_or(""), "route registered");
        self.routes.lock().push(Route {
            segments: parse(path),
            name,
            callback,
        });
    }

    fn navigate_from_args(&self, args: &[Arg]) {
        let Some(path) = args.get(1).and_then(Arg::as_str) else {
            return;
        };
        match self.resolve(path) {
            Some((name, callback, params)) => {
                debug!(path, route = name.as_deref().unwrap_or(""), "navigated");
                if let Some(callback) = callback {
                    let mut f = callback.lock();
                    (*f)(&[Arg::Json(params)]);
                }
            }
            None => warn!(path, "no route matched"),
        }
    }

    fn resolve(&self, path: &str) -> Option<(Option<String>, Option<Handler>, Value)> {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let routes = self.routes.lock();
        routes.iter().find_map(|route| {
            route
                .matches(&parts)
                .map(|params| (route.name.clone(), route.callback.clone(), params))
        })
    }
}

/// Deep routing service: a shared route table reachable from every
/// module in the subtree it is attached to.
pub struct RoutingService {
    inner: Arc<RoutingInner>,
}

impl RoutingService {
    /// Creates a service with an empty route table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RoutingInner {
                routes: Mutex::new(Vec::new()),
                subs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolves a path against the table, returning the route's name
    /// and captured parameters.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<(Option<String>, Value)> {
        self.inner
            .resolve(path)
            .map(|(name, _callback, params)| (name, params))
    }

    /// Number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.inner.routes.lock().len()
    }
}

impl Default for RoutingService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for RoutingService {
    fn name(&self) -> &str {
        "routing"
    }

    fn deep(&self) -> bool {
        true
    }

    fn attach(&self, module: &Module, _parent: Option<&Module>) {
        let register = {
            let inner = Arc::clone(&self.inner);
            handler(move |args: &[Arg]| {
                inner.register_from_args(args);
                None
            })
        };
        let navigate = {
            let inner = Arc::clone(&self.inner);
            handler(move |args: &[Arg]| {
                inner.navigate_from_args(args);
                None
            })
        };
        let subs = vec![
            module.bus().on(events::DO_ROUTE_REGISTER, register),
            module.bus().on(events::DO_ROUTE_NAVIGATE, navigate),
        ];
        self.inner.subs.lock().insert(module.id().uuid(), subs);
    }

    fn detach(&self, module: &Module, _parent: Option<&Module>) {
        let subs = self.inner.subs.lock().remove(&module.id().uuid());
        if let Some(subs) = subs {
            for sub in subs {
                module.bus().unsubscribe(sub);
            }
        }
    }

    fn exposed(&self) -> &[&str] {
        &["route:resolve"]
    }

    fn call(&self, op: &str, args: &[Arg]) -> Option<Arg> {
        match op {
            "route:resolve" => {
                let path = args.first().and_then(Arg::as_str)?;
                Some(match self.inner.resolve(path) {
                    Some((name, _callback, params)) => {
                        Arg::Json(json!({ "name": name, "params": params }))
                    }
                    None => Arg::Json(Value::Null),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_navigate_through_module_wrappers() {
        let shell = Module::new("shell");
        let service = Arc::new(RoutingService::new());
        shell.use_service("routing", service.clone()).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let callback = {
            let seen = Arc::clone(&seen);
            handler(move |args: &[Arg]| {
                *seen.lock() = args.first().and_then(Arg::as_json).cloned();
                None
            })
        };

        shell.route("inbox/:id", Some("open-message"), Some(callback));
        assert_eq!(service.route_count(), 1);

        shell.navigate("inbox/42");
        assert_eq!(seen.lock().clone(), Some(json!({ "id": "42" })));
    }

    #[test]
    fn first_matching_route_wins() {
        let shell = Module::new("shell");
        let svc = Arc::new(RoutingService::new());
        shell.use_service("routing", svc.clone()).unwrap();

        shell.route("a/:x", Some("param"), None);
        shell.route("a/b", Some("literal"), None);

        let (name, params) = svc.resolve("a/b").unwrap();
        assert_eq!(name.as_deref(), Some("param"));
        assert_eq!(params, json!({ "x": "b" }));
    }

    #[test]
    fn unmatched_path_resolves_to_none() {
        let shell = Module::new("shell");
        let svc = Arc::new(RoutingService::new());
        shell.use_service("routing", svc.clone()).unwrap();

        shell.route("a/b", None, None);
        assert!(svc.resolve("a").is_none());
        assert!(svc.resolve("a/b/c").is_none());
        assert!(svc.resolve("a/b").is_some());
    }

    #[test]
    fn routes_registered_from_descendants() {
        let shell = Module::new("shell");
        let svc = Arc::new(RoutingService::new());
        shell.use_service("routing", svc.clone()).unwrap();

        let inbox = Module::new("inbox");
        shell.connect("inbox", &inbox).unwrap();
        inbox.route("inbox/:id", Some("open"), None);

        assert_eq!(svc.route_count(), 1);
        let (name, params) = svc.resolve("inbox/7").unwrap();
        assert_eq!(name.as_deref(), Some("open"));
        assert_eq!(params, json!({ "id": "7" }));
    }

    #[test]
    fn resolve_is_exposed_over_the_bus() {
        let shell = Module::new("shell");
        shell
            .use_service("routing", Arc::new(RoutingService::new()))
            .unwrap();
        shell.route("inbox/:id", Some("open"), None);

        let reply = shell
            .bus()
            .emit("one!route:resolve", vec![Arg::json("inbox/9")])
            .into_first()
            .expect("routing answered");
        assert_eq!(
            reply.as_json().unwrap(),
            &json!({ "name": "open", "params": { "id": "9" } })
        );

        let miss = shell
            .bus()
            .emit("one!route:resolve", vec![Arg::json("nope")])
            .into_first()
            .expect("routing answered");
        assert_eq!(miss.as_json().unwrap(), &Value::Null);
    }

    #[test]
    fn detach_stops_listening() {
        let shell = Module::new("shell");
        let svc = Arc::new(RoutingService::new());
        shell.use_service("routing", svc.clone()).unwrap();
        shell.dispose("routing").unwrap();

        shell.route("a", None, None);
        assert_eq!(svc.route_count(), 0);
    }
}
