//! The module tree node.

use crate::lifecycle::LifeState;
use crate::{events, ModuleError, Phase, ServiceRef, View};
use fossil_event::{Arg, Args, Bus, EventBuffer, EventMap, Handler, PubSub};
use fossil_types::{ModuleId, SubscriptionId};
use fossil_wait::{Deferrable, WaitError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Hook invoked when a lifecycle transition's asynchronous work fails.
pub type ErrorHook = Arc<dyn Fn(&WaitError) + Send + Sync>;

/// The child's handle to its parent: a live facade once connected, a
/// recording buffer before that (and again after a disconnect).
#[derive(Clone)]
enum ParentLink {
    Connected(PubSub),
    Buffered(EventBuffer),
}

impl Default for ParentLink {
    fn default() -> Self {
        Self::Buffered(EventBuffer::new())
    }
}

struct ModuleInner {
    id: ModuleId,
    bus: Bus,
    wait: Deferrable,
    life: Mutex<LifeState>,
    children: Mutex<HashMap<String, Module>>,
    services: Mutex<HashMap<String, ServiceRef>>,
    /// Deep services pending application to future children; `connect`
    /// consults this list, which is how one deep attachment reaches
    /// descendants that do not exist yet.
    deep: Mutex<Vec<ServiceRef>>,
    /// Bus subscriptions installed by the expose step, per service id.
    exposed: Mutex<HashMap<String, Vec<SubscriptionId>>>,
    parent: Mutex<ParentLink>,
    start_with_parent: bool,
    on_start_error: Option<ErrorHook>,
    on_stop_error: Option<ErrorHook>,
}

/// Builder for [`Module`].
pub struct ModuleBuilder {
    name: String,
    start_with_parent: bool,
    events: EventMap,
    on_start_error: Option<ErrorHook>,
    on_stop_error: Option<ErrorHook>,
}

impl ModuleBuilder {
    /// Starts the module automatically when it is connected under a
    /// running parent.
    #[must_use]
    pub fn start_with_parent(mut self, yes: bool) -> Self {
        self.start_with_parent = yes;
        self
    }

    /// Declares an event subscription wired at construction.
    #[must_use]
    pub fn on(mut self, event: impl Into<String>, handler: Handler) -> Self {
        self.events.push((event.into(), handler));
        self
    }

    /// Overrides the start-failure hook. The default logs at error
    /// level.
    #[must_use]
    pub fn on_start_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&WaitError) + Send + Sync + 'static,
    {
        self.on_start_error = Some(Arc::new(hook));
        self
    }

    /// Overrides the stop-failure hook.
    #[must_use]
    pub fn on_stop_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&WaitError) + Send + Sync + 'static,
    {
        self.on_stop_error = Some(Arc::new(hook));
        self
    }

    /// Builds the module.
    #[must_use]
    pub fn build(self) -> Module {
        let bus = Bus::new();
        bus.wire(self.events);
        Module {
            inner: Arc::new(ModuleInner {
                id: ModuleId::named(self.name),
                bus,
                wait: Deferrable::new(),
                life: Mutex::new(LifeState::default()),
                children: Mutex::new(HashMap::new()),
                services: Mutex::new(HashMap::new()),
                deep: Mutex::new(Vec::new()),
                exposed: Mutex::new(HashMap::new()),
                parent: Mutex::new(ParentLink::default()),
                start_with_parent: self.start_with_parent,
                on_start_error: self.on_start_error,
                on_stop_error: self.on_stop_error,
            }),
        }
    }
}

/// A node in the composition tree.
///
/// Cheap to clone; clones share the node. A module owns its children
/// and services by id, a bus for all of its event traffic, and a join
/// owner aggregating asynchronous lifecycle work.
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

impl Module {
    /// Starts building a module with the given display name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            name: name.into(),
            start_with_parent: false,
            events: Vec::new(),
            on_start_error: None,
            on_stop_error: None,
        }
    }

    /// Builds a module with defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    /// Returns the module's identity.
    #[must_use]
    pub fn id(&self) -> &ModuleId {
        &self.inner.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.id.name()
    }

    /// Returns the module's bus.
    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Returns the join owner aggregating this module's asynchronous
    /// lifecycle work. Listeners call `wait_for` on it from within
    /// `start`/`standby`/`stop` handlers.
    #[must_use]
    pub fn deferrable(&self) -> &Deferrable {
        &self.inner.wait
    }

    /// Returns the current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.life.lock().phase
    }

    /// Wraps this module for use as an event argument; listeners get
    /// it back via [`Arg::downcast::<Module>`](Arg::downcast).
    #[must_use]
    pub fn as_arg(&self) -> Arg {
        Arg::handle(self.clone())
    }

    // === tree access ===

    /// Returns the child registered under `id`.
    #[must_use]
    pub fn child(&self, id: &str) -> Option<Module> {
        self.inner.children.lock().get(id).cloned()
    }

    /// Snapshot of the current children.
    #[must_use]
    pub fn children(&self) -> Vec<(String, Module)> {
        self.inner
            .children
            .lock()
            .iter()
            .map(|(id, module)| (id.clone(), module.clone()))
            .collect()
    }

    /// Returns the service registered under `id`.
    #[must_use]
    pub fn service(&self, id: &str) -> Option<ServiceRef> {
        self.inner.services.lock().get(id).cloned()
    }

    /// Returns `true` while connected to a parent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(&*self.inner.parent.lock(), ParentLink::Connected(_))
    }

    /// Returns the live parent facade, if connected.
    #[must_use]
    pub fn parent(&self) -> Option<PubSub> {
        match &*self.inner.parent.lock() {
            ParentLink::Connected(parent) => Some(parent.clone()),
            ParentLink::Buffered(_) => None,
        }
    }

    /// Emits toward the parent. While disconnected the emission is
    /// recorded and replayed at the next connect.
    pub fn parent_emit(&self, event: &str, args: Args) -> Result<(), ModuleError> {
        let link = self.inner.parent.lock().clone();
        match link {
            ParentLink::Connected(parent) => {
                parent.emit(event, args)?;
            }
            ParentLink::Buffered(buffer) => buffer.emit(event, args),
        }
        Ok(())
    }

    /// Subscribes on the parent's bus. While disconnected the
    /// subscription is recorded and replayed at the next connect.
    pub fn parent_on(&self, event: &str, handler: Handler) -> Result<(), ModuleError> {
        let link = self.inner.parent.lock().clone();
        match link {
            ParentLink::Connected(parent) => {
                parent.on(event, handler)?;
            }
            ParentLink::Buffered(buffer) => buffer.on(event, handler),
        }
        Ok(())
    }

    // === connect / disconnect ===

    /// Connects `child` under `id`.
    ///
    /// An existing occupant of `id` is disconnected first, completely,
    /// before the new child is wired in.
    pub fn connect(&self, id: impl Into<String>, child: &Module) -> Result<(), ModuleError> {
        self.connect_with(id, child, Vec::new())
    }

    /// [`connect`](Self::connect) with extra event arguments appended
    /// to both structural events.
    pub fn connect_with(
        &self,
        id: impl Into<String>,
        child: &Module,
        extra: Args,
    ) -> Result<(), ModuleError> {
        let id = id.into();
        if Arc::ptr_eq(&self.inner, &child.inner) {
            return Err(ModuleError::SelfConnect(self.name().to_string()));
        }

        if self.inner.children.lock().contains_key(&id) {
            self.disconnect(&id)?;
        }
        if child.is_connected() {
            return Err(ModuleError::AlreadyConnected(child.name().to_string()));
        }

        self.inner.children.lock().insert(id.clone(), child.clone());

        // Swap the child's parent link to a scoped facade of this
        // module's bus, then replay whatever the child buffered while
        // it was detached.
        let facade = self.inner.bus.pubsub();
        let buffer = {
            let mut link = child.inner.parent.lock();
            match std::mem::replace(&mut *link, ParentLink::Connected(facade.clone())) {
                ParentLink::Buffered(buffer) => buffer,
                // Guarded by the is_connected check above; nothing to
                // replay either way.
                ParentLink::Connected(_) => EventBuffer::new(),
            }
        };
        buffer.replay(&facade)?;
        debug!(parent = %self.inner.id, child = %child.inner.id, id = %id, "child connected");

        // Pending deep services reach the new subtree.
        let deep: Vec<ServiceRef> = self.inner.deep.lock().clone();
        for service in &deep {
            attach_deep(service, child, Some(self));
        }

        if self.phase().is_running() && child.inner.start_with_parent {
            child.start();
        }

        let mut child_args = vec![self.as_arg(), Arg::json(id.clone()), child.as_arg()];
        child_args.extend(extra.iter().cloned());
        child.inner.bus.emit(events::DO_CONNECT_TO_PARENT, child_args);

        let mut parent_args = vec![child.as_arg(), Arg::json(id), self.as_arg()];
        parent_args.extend(extra);
        self.inner.bus.emit(events::ON_CHILD_CONNECT, parent_args);
        Ok(())
    }

    /// Connects a batch of id/module pairs in order.
    pub fn connect_all(&self, pairs: Vec<(String, Module)>) -> Result<(), ModuleError> {
        for (id, child) in pairs {
            self.connect(id, &child)?;
        }
        Ok(())
    }

    /// Disconnects the child under `id`. A vacant id is a no-op.
    pub fn disconnect(&self, id: &str) -> Result<(), ModuleError> {
        self.disconnect_with(id, Vec::new())
    }

    /// [`disconnect`](Self::disconnect) with extra event arguments.
    pub fn disconnect_with(&self, id: &str, extra: Args) -> Result<(), ModuleError> {
        let Some(child) = self.inner.children.lock().remove(id) else {
            return Ok(());
        };

        let deep: Vec<ServiceRef> = self.inner.deep.lock().clone();
        for service in deep.iter().rev() {
            detach_deep(service, &child, Some(self));
        }

        *child.inner.parent.lock() = ParentLink::default();
        debug!(parent = %self.inner.id, child = %child.inner.id, id = %id, "child disconnected");

        let mut child_args = vec![self.as_arg(), Arg::json(id), child.as_arg()];
        child_args.extend(extra.iter().cloned());
        child
            .inner
            .bus
            .emit(events::DO_DISCONNECT_FROM_PARENT, child_args);

        let mut parent_args = vec![child.as_arg(), Arg::json(id), self.as_arg()];
        parent_args.extend(extra);
        self.inner.bus.emit(events::ON_CHILD_DISCONNECT, parent_args);
        Ok(())
    }

    /// Disconnects a batch of ids in order.
    pub fn disconnect_all<I, S>(&self, ids: I) -> Result<(), ModuleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            self.disconnect(id.as_ref())?;
        }
        Ok(())
    }

    // === use / dispose ===

    /// Attaches a service under `id`. An existing occupant of `id` is
    /// disposed first.
    pub fn use_service(&self, id: impl Into<String>, service: ServiceRef) -> Result<(), ModuleError> {
        self.use_service_with(id, service, Vec::new())
    }

    /// [`use_service`](Self::use_service) with extra event arguments.
    pub fn use_service_with(
        &self,
        id: impl Into<String>,
        service: ServiceRef,
        extra: Args,
    ) -> Result<(), ModuleError> {
        let id = id.into();
        if self.inner.services.lock().contains_key(&id) {
            self.dispose(&id)?;
        }

        self.inner
            .services
            .lock()
            .insert(id.clone(), Arc::clone(&service));
        self.expose(&id, &service);
        service.attach(self, None);
        if service.deep() {
            {
                let mut deep = self.inner.deep.lock();
                if !deep.iter().any(|s| Arc::ptr_eq(s, &service)) {
                    deep.push(Arc::clone(&service));
                }
            }
            for (_, child) in self.children() {
                attach_deep(&service, &child, Some(self));
            }
        }
        debug!(module = %self.inner.id, service = service.name(), id = %id, "service attached");

        let mut use_args = vec![self.as_arg(), Arg::json(id.clone()), Arg::json(service.name())];
        use_args.extend(extra.iter().cloned());
        self.inner.bus.emit(events::DO_USE_MODULE, use_args);

        let mut on_args = vec![Arg::json(service.name()), Arg::json(id), self.as_arg()];
        on_args.extend(extra);
        self.inner.bus.emit(events::ON_SERVICE_USE, on_args);
        Ok(())
    }

    /// Detaches the service under `id`. A vacant id is a no-op.
    pub fn dispose(&self, id: &str) -> Result<(), ModuleError> {
        self.dispose_with(id, Vec::new())
    }

    /// [`dispose`](Self::dispose) with extra event arguments.
    pub fn dispose_with(&self, id: &str, extra: Args) -> Result<(), ModuleError> {
        let Some(service) = self.inner.services.lock().remove(id) else {
            return Ok(());
        };

        // Reverse of the attach order: deep teardown first.
        if service.deep() {
            self.inner.deep.lock().retain(|s| !Arc::ptr_eq(s, &service));
            for (_, child) in self.children() {
                detach_deep(&service, &child, Some(self));
            }
        }
        service.detach(self, None);
        self.unexpose(id);
        debug!(module = %self.inner.id, service = service.name(), id = %id, "service detached");

        let mut dispose_args = vec![self.as_arg(), Arg::json(id), Arg::json(service.name())];
        dispose_args.extend(extra.iter().cloned());
        self.inner.bus.emit(events::DO_DISPOSE_MODULE, dispose_args);

        let mut on_args = vec![Arg::json(service.name()), Arg::json(id), self.as_arg()];
        on_args.extend(extra);
        self.inner.bus.emit(events::ON_SERVICE_DISPOSE, on_args);
        Ok(())
    }

    /// Subscribes a service's exposed operations, answered through the
    /// `one!` request path.
    fn expose(&self, id: &str, service: &ServiceRef) {
        let ops = service.exposed();
        if ops.is_empty() {
            return;
        }
        let mut subs = Vec::with_capacity(ops.len());
        for op in ops {
            let svc = Arc::clone(service);
            let op_name = (*op).to_string();
            subs.push(self.inner.bus.on(
                op_name.clone(),
                fossil_event::handler(move |args: &[Arg]| svc.call(&op_name, args)),
            ));
        }
        self.inner.exposed.lock().insert(id.to_string(), subs);
    }

    fn unexpose(&self, id: &str) {
        let subs = self.inner.exposed.lock().remove(id);
        if let Some(subs) = subs {
            for sub in subs {
                self.inner.bus.unsubscribe(sub);
            }
        }
    }

    // === lifecycle ===

    /// Starts the module.
    ///
    /// Returns `false` without effect when already running or while a
    /// previous transition's asynchronous work is still pending. The
    /// first start of an epoch fires `start:first` before `start`.
    /// Work registered by start listeners via the module's
    /// [`deferrable`](Self::deferrable) routes its failure, if any, to
    /// the start-failure hook.
    pub fn start(&self) -> bool {
        if self.inner.wait.is_waiting() {
            debug!(module = %self.inner.id, "start refused, transition in flight");
            return false;
        }
        let fire_first = {
            let mut life = self.inner.life.lock();
            if life.phase.is_running() {
                return false;
            }
            let first = !life.ever_started;
            life.ever_started = true;
            life.phase = Phase::Running;
            first
        };
        if fire_first {
            self.inner.bus.emit(events::START_FIRST, vec![self.as_arg()]);
        }
        self.inner.bus.emit(events::START, vec![self.as_arg()]);
        if self.inner.wait.is_waiting() {
            let me = self.clone();
            self.inner
                .wait
                .then_or_else(|_| {}, move |err| me.start_failed(&err));
        }
        true
    }

    /// Leaves the running phase without ending the epoch.
    ///
    /// Returns `false` when not running or while a transition's work
    /// is pending.
    pub fn standby(&self) -> bool {
        if self.inner.wait.is_waiting() {
            debug!(module = %self.inner.id, "standby refused, transition in flight");
            return false;
        }
        {
            let mut life = self.inner.life.lock();
            if !life.phase.is_running() {
                return false;
            }
            life.phase = Phase::Standby;
        }
        self.inner.bus.emit(events::STANDBY, vec![self.as_arg()]);
        true
    }

    /// Stops the module, ending the epoch.
    ///
    /// Funnels through [`standby`](Self::standby) first. The `stop`
    /// event fires once asynchronous work registered by the standby
    /// listeners settles; the first-start tracking is then reset, so a
    /// later [`start`](Self::start) fires `start:first` again. Returns
    /// `false` when never started in this epoch or while a
    /// transition's work is pending.
    pub fn stop(&self) -> bool {
        if self.inner.wait.is_waiting() {
            debug!(module = %self.inner.id, "stop refused, transition in flight");
            return false;
        }
        if !self.inner.life.lock().ever_started {
            return false;
        }
        self.standby();

        let on_settled = {
            let me = self.clone();
            move |_results: Value| {
                {
                    let mut life = me.inner.life.lock();
                    life.phase = Phase::Stopped;
                    life.ever_started = false;
                }
                me.inner.bus.emit(events::STOP, vec![me.as_arg()]);
            }
        };
        let on_failed = {
            let me = self.clone();
            move |err: WaitError| me.stop_failed(&err)
        };
        self.inner.wait.then_or_else(on_settled, on_failed);
        true
    }

    fn start_failed(&self, err: &WaitError) {
        match &self.inner.on_start_error {
            Some(hook) => hook(err),
            None => error!(module = %self.inner.id, %err, "start failed"),
        }
    }

    fn stop_failed(&self, err: &WaitError) {
        match &self.inner.on_stop_error {
            Some(hook) => hook(err),
            None => error!(module = %self.inner.id, %err, "stop failed"),
        }
    }

    // === structural request wrappers ===

    /// Requests navigation: emits `do:route:navigate` with this module
    /// and the path.
    pub fn navigate(&self, path: &str) {
        self.navigate_with(path, Vec::new());
    }

    /// [`navigate`](Self::navigate) with extra event arguments.
    pub fn navigate_with(&self, path: &str, extra: Args) {
        let mut args = vec![self.as_arg(), Arg::json(path)];
        args.extend(extra);
        self.inner.bus.emit(events::DO_ROUTE_NAVIGATE, args);
    }

    /// Requests route registration: emits `do:route:register` with
    /// this module, the path, an optional route name, and an optional
    /// callback invoked on navigation with the captured parameters.
    pub fn route(&self, path: &str, name: Option<&str>, callback: Option<Handler>) {
        let mut args = vec![
            self.as_arg(),
            Arg::json(path),
            match name {
                Some(name) => Arg::json(name),
                None => Arg::Json(Value::Null),
            },
        ];
        if let Some(callback) = callback {
            args.push(Arg::Callback(callback));
        }
        self.inner.bus.emit(events::DO_ROUTE_REGISTER, args);
    }

    /// Requests a render: emits `do:view:render` with this module and
    /// the view.
    pub fn render<V: View + 'static>(&self, view: &Arc<V>) {
        self.inner
            .bus
            .emit(events::DO_VIEW_RENDER, vec![self.as_arg(), Arg::shared(Arc::clone(view))]);
    }

    /// Requests a display attach: emits `do:view:attach`.
    pub fn attach_view<V: View + 'static>(&self, view: &Arc<V>) {
        self.attach_view_with(view, Vec::new());
    }

    /// [`attach_view`](Self::attach_view) with extra event arguments
    /// (a canvas region id, typically).
    pub fn attach_view_with<V: View + 'static>(&self, view: &Arc<V>, extra: Args) {
        let mut args = vec![self.as_arg(), Arg::shared(Arc::clone(view))];
        args.extend(extra);
        self.inner.bus.emit(events::DO_VIEW_ATTACH, args);
    }

    /// Render-then-attach, skipping the render for a recyclable view
    /// that is already rendered.
    pub fn use_view<V: View + 'static>(&self, view: &Arc<V>) {
        if !(view.recycle() && view.is_rendered()) {
            self.render(view);
        }
        self.attach_view(view);
    }
}

/// Applies a deep service to a subtree: register in each node's
/// pending-deep list, attach, recurse. Iterates child snapshots, so a
/// service's own attach hook may mutate the tree.
fn attach_deep(service: &ServiceRef, module: &Module, parent: Option<&Module>) {
    {
        let mut deep = module.inner.deep.lock();
        if deep.iter().any(|s| Arc::ptr_eq(s, service)) {
            return;
        }
        deep.push(Arc::clone(service));
    }
    service.attach(module, parent);
    for (_, child) in module.children() {
        attach_deep(service, &child, Some(module));
    }
}

/// Reverse of [`attach_deep`]: deregister, recurse into children,
/// detach on the way out.
fn detach_deep(service: &ServiceRef, module: &Module, parent: Option<&Module>) {
    {
        let mut deep = module.inner.deep.lock();
        let before = deep.len();
        deep.retain(|s| !Arc::ptr_eq(s, service));
        if deep.len() == before {
            return;
        }
    }
    for (_, child) in module.children() {
        detach_deep(service, &child, Some(module));
    }
    service.detach(module, parent);
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.inner.id)
            .field("phase", &self.phase())
            .field("children", &self.inner.children.lock().len())
            .field("services", &self.inner.services.lock().len())
            .finish()
    }
}
