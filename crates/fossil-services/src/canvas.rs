//! Named display regions.
//!
//! The canvas service owns a fixed set of region ids declared at
//! construction. Modules request placement by emitting
//! `do:view:attach` with a region id as the extra argument (the
//! [`Module::attach_view_with`](fossil_module::Module::attach_view_with)
//! wrapper); the service records which module occupies which region.
//!
//! Asking for a region that was never declared is a programming error
//! and surfaces loudly: [`ServiceError::UnknownRegion`] from the
//! direct API, an error-level log entry from the event path.

use crate::ServiceError;
use fossil_event::{handler, Arg};
use fossil_module::{events, Module, Service};
use fossil_types::{ModuleId, SubscriptionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, trace};
use uuid::Uuid;

struct CanvasInner {
    regions: Mutex<HashMap<String, Option<ModuleId>>>,
    subs: Mutex<HashMap<Uuid, Vec<SubscriptionId>>>,
}

impl CanvasInner {
    fn place(&self, region: &str, occupant: &ModuleId) -> Result<(), ServiceError> {
        let mut regions = self.regions.lock();
        match regions.get_mut(region) {
            Some(slot) => {
                debug!(region, module = %occupant, "region occupied");
                *slot = Some(occupant.clone());
                Ok(())
            }
            None => Err(ServiceError::UnknownRegion(region.to_string())),
        }
    }
}

/// Deep region registry for view placement.
pub struct CanvasService {
    inner: Arc<CanvasInner>,
}

impl CanvasService {
    /// Creates a canvas with the given region ids, all vacant.
    #[must_use]
    pub fn with_regions<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(CanvasInner {
                regions: Mutex::new(
                    regions.into_iter().map(|id| (id.into(), None)).collect(),
                ),
                subs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Marks `region` as occupied by `module`.
    pub fn place(&self, region: &str, module: &ModuleId) -> Result<(), ServiceError> {
        self.inner.place(region, module)
    }

    /// Vacates a region, returning its previous occupant.
    pub fn vacate(&self, region: &str) -> Result<Option<ModuleId>, ServiceError> {
        let mut regions = self.inner.regions.lock();
        match regions.get_mut(region) {
            Some(slot) => Ok(slot.take()),
            None => Err(ServiceError::UnknownRegion(region.to_string())),
        }
    }

    /// Returns a region's occupant.
    pub fn occupant(&self, region: &str) -> Result<Option<ModuleId>, ServiceError> {
        self.inner
            .regions
            .lock()
            .get(region)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownRegion(region.to_string()))
    }

    /// Declared region ids.
    #[must_use]
    pub fn regions(&self) -> Vec<String> {
        self.inner.regions.lock().keys().cloned().collect()
    }
}

impl Service for CanvasService {
    fn name(&self) -> &str {
        "canvas"
    }

    fn deep(&self) -> bool {
        true
    }

    fn attach(&self, module: &Module, _parent: Option<&Module>) {
        let inner = Arc::clone(&self.inner);
        let sub = module.bus().on(
            events::DO_VIEW_ATTACH,
            handler(move |args: &[Arg]| {
                let requester = args.first().and_then(|arg| arg.downcast::<Module>());
                let region = args.get(2).and_then(Arg::as_str);
                match (requester, region) {
                    (Some(module), Some(region)) => {
                        if let Err(err) = inner.place(region, module.id()) {
                            error!(%err, module = %module.id(), "view attach refused");
                        }
                    }
                    // An attach without a region id is not for the
                    // canvas.
                    _ => trace!("view attach without region, ignored"),
                }
                None
            }),
        );
        self.inner
            .subs
            .lock()
            .entry(module.id().uuid())
            .or_default()
            .push(sub);
    }

    fn detach(&self, module: &Module, _parent: Option<&Module>) {
        let subs = self.inner.subs.lock().remove(&module.id().uuid());
        if let Some(subs) = subs {
            for sub in subs {
                module.bus().unsubscribe(sub);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fossil_module::View;

    struct Panel;
    impl View for Panel {}

    #[test]
    fn place_and_vacate() {
        let canvas = CanvasService::with_regions(["main", "sidebar"]);
        let module = Module::new("inbox");

        canvas.place("main", module.id()).unwrap();
        assert_eq!(canvas.occupant("main").unwrap(), Some(module.id().clone()));
        assert_eq!(canvas.occupant("sidebar").unwrap(), None);

        assert_eq!(canvas.vacate("main").unwrap(), Some(module.id().clone()));
        assert_eq!(canvas.occupant("main").unwrap(), None);
    }

    #[test]
    fn unknown_region_is_loud() {
        let canvas = CanvasService::with_regions(["main"]);
        let module = Module::new("inbox");

        let err = canvas.place("footer", module.id()).unwrap_err();
        assert_eq!(err, ServiceError::UnknownRegion("footer".into()));
        assert!(canvas.occupant("footer").is_err());
        assert!(canvas.vacate("footer").is_err());
    }

    #[test]
    fn attach_event_places_the_module() {
        let shell = Module::new("shell");
        let canvas = Arc::new(CanvasService::with_regions(["main"]));
        shell.use_service("canvas", canvas.clone()).unwrap();

        let view = Arc::new(Panel);
        shell.attach_view_with(&view, vec![Arg::json("main")]);
        assert_eq!(canvas.occupant("main").unwrap(), Some(shell.id().clone()));
    }

    #[test]
    fn descendants_reach_the_canvas() {
        let shell = Module::new("shell");
        let canvas = Arc::new(CanvasService::with_regions(["main"]));
        shell.use_service("canvas", canvas.clone()).unwrap();

        let inbox = Module::new("inbox");
        shell.connect("inbox", &inbox).unwrap();

        let view = Arc::new(Panel);
        inbox.attach_view_with(&view, vec![Arg::json("main")]);
        assert_eq!(canvas.occupant("main").unwrap(), Some(inbox.id().clone()));
    }

    #[test]
    fn attach_without_region_is_ignored() {
        let shell = Module::new("shell");
        let canvas = Arc::new(CanvasService::with_regions(["main"]));
        shell.use_service("canvas", canvas.clone()).unwrap();

        let view = Arc::new(Panel);
        shell.attach_view(&view);
        assert_eq!(canvas.occupant("main").unwrap(), None);
    }
}
