//! Tree protocol integration: connect/disconnect, buffering, deep
//! service propagation, and the expose round trip.

use fossil_event::{handler, Arg};
use fossil_module::{events, Module, Service};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn tap(module: &Module, event: &str, log: &Log, tag: &str) {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    module.bus().on(
        event,
        handler(move |_args: &[Arg]| {
            log.lock().push(tag.clone());
            None
        }),
    );
}

/// Records attach/detach per module name.
struct Probe {
    tag: &'static str,
    log: Log,
    deep: bool,
}

impl Probe {
    fn new(tag: &'static str, log: &Log, deep: bool) -> Arc<Self> {
        Arc::new(Self {
            tag,
            log: Arc::clone(log),
            deep,
        })
    }
}

impl Service for Probe {
    fn name(&self) -> &str {
        self.tag
    }

    fn attach(&self, module: &Module, _parent: Option<&Module>) {
        self.log
            .lock()
            .push(format!("{}:attach:{}", self.tag, module.name()));
    }

    fn detach(&self, module: &Module, _parent: Option<&Module>) {
        self.log
            .lock()
            .push(format!("{}:detach:{}", self.tag, module.name()));
    }

    fn deep(&self) -> bool {
        self.deep
    }
}

#[test]
fn connect_replaces_existing_child() {
    let parent = Module::new("parent");
    let first = Module::new("first");
    let second = Module::new("second");
    let order = log();

    tap(&first, events::DO_DISCONNECT_FROM_PARENT, &order, "first:out");
    tap(&second, events::DO_CONNECT_TO_PARENT, &order, "second:in");

    parent.connect("slot", &first).unwrap();
    parent.connect("slot", &second).unwrap();

    // The old occupant's disconnect completes before the new connect.
    assert_eq!(*order.lock(), vec!["first:out", "second:in"]);
    assert!(!first.is_connected());
    assert_eq!(
        parent.child("slot").map(|m| m.id().clone()),
        Some(second.id().clone())
    );
}

#[test]
fn structural_events_carry_tree_references() {
    let parent = Module::new("parent");
    let child = Module::new("child");
    let seen = Arc::new(Mutex::new(None));

    parent.bus().on(events::ON_CHILD_CONNECT, {
        let seen = Arc::clone(&seen);
        handler(move |args: &[Arg]| {
            let connected = args[0].downcast::<Module>().expect("child handle");
            let id = args[1].as_str().expect("slot id").to_string();
            let owner = args[2].downcast::<Module>().expect("parent handle");
            *seen.lock() = Some((connected.name().to_string(), id, owner.name().to_string()));
            None
        })
    });

    parent.connect("kid", &child).unwrap();
    assert_eq!(
        seen.lock().clone(),
        Some(("child".to_string(), "kid".to_string(), "parent".to_string()))
    );
}

#[test]
fn connect_forwards_extra_args() {
    let parent = Module::new("parent");
    let child = Module::new("child");
    let extra = Arc::new(Mutex::new(None));

    child.bus().on(events::DO_CONNECT_TO_PARENT, {
        let extra = Arc::clone(&extra);
        handler(move |args: &[Arg]| {
            *extra.lock() = args.get(3).and_then(Arg::as_json).cloned();
            None
        })
    });

    parent
        .connect_with("kid", &child, vec![Arg::json("restored")])
        .unwrap();
    assert_eq!(extra.lock().clone(), Some(json!("restored")));
}

#[test]
fn buffered_emissions_replay_on_connect() {
    let child = Module::new("child");
    // Emitted while detached: recorded, not dispatched.
    child
        .parent_emit("child:ready", vec![Arg::json("early"), Arg::SelfRef])
        .unwrap();

    let parent = Module::new("parent");
    let seen = Arc::new(Mutex::new(None));
    parent.bus().on("child:ready", {
        let seen = Arc::clone(&seen);
        handler(move |args: &[Arg]| {
            let payload = args[0].as_json().cloned();
            let rebound = args[1].as_pubsub().and_then(|p| p.bus_id());
            *seen.lock() = Some((payload, rebound));
            None
        })
    });

    parent.connect("kid", &child).unwrap();

    let (payload, rebound) = seen.lock().clone().expect("replayed at connect");
    assert_eq!(payload, Some(json!("early")));
    // The recorded self-reference rebound to the parent's live bus.
    assert_eq!(rebound, Some(parent.bus().id()));
}

#[test]
fn buffered_subscriptions_replay_on_connect() {
    let child = Module::new("child");
    let heard = Arc::new(Mutex::new(0usize));
    child
        .parent_on("parent:tick", {
            let heard = Arc::clone(&heard);
            handler(move |_args| {
                *heard.lock() += 1;
                None
            })
        })
        .unwrap();

    let parent = Module::new("parent");
    parent.bus().emit("parent:tick", vec![]);
    assert_eq!(*heard.lock(), 0, "not wired before connect");

    parent.connect("kid", &child).unwrap();
    parent.bus().emit("parent:tick", vec![]);
    assert_eq!(*heard.lock(), 1);
}

#[test]
fn disconnect_stubs_child_back_to_buffering() {
    let parent = Module::new("parent");
    let child = Module::new("child");
    parent.connect("kid", &child).unwrap();
    parent.disconnect("kid").unwrap();

    assert!(!child.is_connected());
    // Traffic buffers again and survives a reconnect.
    child.parent_emit("late:news", vec![Arg::json(1)]).unwrap();

    let seen = Arc::new(Mutex::new(false));
    let adopter = Module::new("adopter");
    adopter.bus().on("late:news", {
        let seen = Arc::clone(&seen);
        handler(move |_args| {
            *seen.lock() = true;
            None
        })
    });
    adopter.connect("kid", &child).unwrap();
    assert!(*seen.lock());
}

#[test]
fn deep_service_reaches_present_and_future_descendants() {
    let trace = log();
    let root = Module::new("root");
    let service = Probe::new("canvas", &trace, true);

    root.use_service("canvas", service).unwrap();
    assert_eq!(*trace.lock(), vec!["canvas:attach:root"]);

    // Future child: no extra call needed.
    let child = Module::new("child");
    root.connect("c", &child).unwrap();
    assert!(trace.lock().contains(&"canvas:attach:child".to_string()));

    // Future grandchild, connected to the child later.
    let grand = Module::new("grand");
    child.connect("g", &grand).unwrap();
    assert!(trace.lock().contains(&"canvas:attach:grand".to_string()));
}

#[test]
fn deep_service_detaches_from_departing_subtree() {
    let trace = log();
    let root = Module::new("root");
    let child = Module::new("child");
    let grand = Module::new("grand");
    root.connect("c", &child).unwrap();
    child.connect("g", &grand).unwrap();

    root.use_service("canvas", Probe::new("canvas", &trace, true))
        .unwrap();
    trace.lock().clear();

    root.disconnect("c").unwrap();
    // Children detach before their parent, mirroring attach order.
    assert_eq!(
        *trace.lock(),
        vec!["canvas:detach:grand", "canvas:detach:child"]
    );

    // The subtree no longer receives the service.
    let late = Module::new("late");
    child.connect("l", &late).unwrap();
    assert!(!trace.lock().contains(&"canvas:attach:late".to_string()));
}

#[test]
fn dispose_unwinds_deep_service() {
    let trace = log();
    let root = Module::new("root");
    let child = Module::new("child");
    root.connect("c", &child).unwrap();
    root.use_service("canvas", Probe::new("canvas", &trace, true))
        .unwrap();
    trace.lock().clear();

    root.dispose("canvas").unwrap();
    assert_eq!(
        *trace.lock(),
        vec!["canvas:detach:child", "canvas:detach:root"]
    );
    assert!(root.service("canvas").is_none());
}

#[test]
fn shallow_service_stays_local() {
    let trace = log();
    let root = Module::new("root");
    root.use_service("session", Probe::new("session", &trace, false))
        .unwrap();

    let child = Module::new("child");
    root.connect("c", &child).unwrap();
    assert_eq!(*trace.lock(), vec!["session:attach:root"]);
}

#[test]
fn use_replaces_existing_service() {
    let trace = log();
    let host = Module::new("host");
    host.use_service("svc", Probe::new("alpha", &trace, false))
        .unwrap();
    host.use_service("svc", Probe::new("beta", &trace, false))
        .unwrap();

    assert_eq!(
        *trace.lock(),
        vec!["alpha:attach:host", "alpha:detach:host", "beta:attach:host"]
    );
    assert_eq!(host.service("svc").map(|s| s.name().to_string()), Some("beta".into()));
}

#[test]
fn service_attach_emits_notifications() {
    let host = Module::new("host");
    let seen = Arc::new(Mutex::new(None));
    host.bus().on(events::ON_SERVICE_USE, {
        let seen = Arc::clone(&seen);
        handler(move |args: &[Arg]| {
            let name = args[0].as_str().map(str::to_string);
            let id = args[1].as_str().map(str::to_string);
            *seen.lock() = Some((name, id));
            None
        })
    });

    let trace = log();
    host.use_service("probe-id", Probe::new("probe", &trace, false))
        .unwrap();
    assert_eq!(
        seen.lock().clone(),
        Some((Some("probe".into()), Some("probe-id".into())))
    );
}

/// A service answering exposed operations over the `one!` path.
#[derive(Default)]
struct KvService {
    values: Mutex<HashMap<String, Value>>,
}

impl Service for KvService {
    fn name(&self) -> &str {
        "kv"
    }

    fn exposed(&self) -> &[&str] {
        &["kv:get", "kv:set"]
    }

    fn call(&self, op: &str, args: &[Arg]) -> Option<Arg> {
        let key = args.first().and_then(Arg::as_str)?.to_string();
        match op {
            "kv:set" => {
                let value = args.get(1).and_then(Arg::as_json).cloned()?;
                self.values.lock().insert(key, value);
                Some(Arg::json(true))
            }
            "kv:get" => {
                let value = self.values.lock().get(&key).cloned().unwrap_or(Value::Null);
                Some(Arg::Json(value))
            }
            _ => None,
        }
    }
}

#[test]
fn exposed_operations_answer_over_the_bus() {
    let host = Module::new("host");
    host.use_service("kv", Arc::new(KvService::default())).unwrap();

    host.bus()
        .emit("one!kv:set", vec![Arg::json("color"), Arg::json("teal")]);
    let reply = host
        .bus()
        .emit("one!kv:get", vec![Arg::json("color")])
        .into_first()
        .expect("service answered");
    assert_eq!(reply.as_json().unwrap(), &json!("teal"));
}

#[test]
fn dispose_removes_exposed_operations() {
    let host = Module::new("host");
    host.use_service("kv", Arc::new(KvService::default())).unwrap();
    host.dispose("kv").unwrap();

    let reply = host.bus().emit("one!kv:get", vec![Arg::json("color")]);
    assert!(reply.into_first().is_none());
}

struct RecycledPanel;

impl fossil_module::View for RecycledPanel {
    fn is_rendered(&self) -> bool {
        true
    }

    fn recycle(&self) -> bool {
        true
    }
}

struct FreshPanel;
impl fossil_module::View for FreshPanel {}

#[test]
fn use_view_skips_render_for_recycled_views() {
    let module = Module::new("m");
    let order = log();
    tap(&module, events::DO_VIEW_RENDER, &order, "render");
    tap(&module, events::DO_VIEW_ATTACH, &order, "attach");

    module.use_view(&Arc::new(FreshPanel));
    assert_eq!(*order.lock(), vec!["render", "attach"]);

    order.lock().clear();
    module.use_view(&Arc::new(RecycledPanel));
    assert_eq!(*order.lock(), vec!["attach"]);
}

#[test]
fn connect_all_wires_every_pair() {
    let parent = Module::new("parent");
    parent
        .connect_all(vec![
            ("a".to_string(), Module::new("a")),
            ("b".to_string(), Module::new("b")),
        ])
        .unwrap();

    assert!(parent.child("a").is_some());
    assert!(parent.child("b").is_some());

    parent.disconnect_all(["a", "b"]).unwrap();
    assert!(parent.children().is_empty());
}

#[test]
fn child_starts_with_running_parent() {
    let parent = Module::new("parent");
    parent.start();

    let eager = Module::builder("eager").start_with_parent(true).build();
    let lazy = Module::new("lazy");
    parent.connect("eager", &eager).unwrap();
    parent.connect("lazy", &lazy).unwrap();

    assert!(eager.phase().is_running());
    assert!(!lazy.phase().is_running());
}

#[test]
fn child_stays_idle_under_idle_parent() {
    let parent = Module::new("parent");
    let eager = Module::builder("eager").start_with_parent(true).build();
    parent.connect("eager", &eager).unwrap();
    assert!(!eager.phase().is_running());
}
