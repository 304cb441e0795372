//! Declarative event forwarding.
//!
//! Installs a set of `(source, destination)` forward rules on every
//! module it is attached to: an emission of `source` re-emits as
//! `destination` with the same arguments. Useful for adapting one
//! component's event vocabulary to another's without touching either.

use fossil_module::{Module, Service};
use fossil_types::SubscriptionId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Forward-rule service.
pub struct RelayService {
    rules: Vec<(String, String)>,
    spans_subtree: bool,
    subs: Arc<Mutex<HashMap<Uuid, Vec<SubscriptionId>>>>,
}

impl RelayService {
    /// Creates a relay with the given `(source, destination)` rules.
    ///
    /// `deep` makes the rules propagate to every present and future
    /// descendant of the host module.
    #[must_use]
    pub fn new(rules: Vec<(String, String)>, deep: bool) -> Self {
        Self {
            rules,
            spans_subtree: deep,
            subs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The configured rules.
    #[must_use]
    pub fn rules(&self) -> &[(String, String)] {
        &self.rules
    }
}

impl Service for RelayService {
    fn name(&self) -> &str {
        "relay"
    }

    fn deep(&self) -> bool {
        self.spans_subtree
    }

    fn attach(&self, module: &Module, _parent: Option<&Module>) {
        let subs = self
            .rules
            .iter()
            .map(|(src, dest)| module.bus().forward(src.clone(), dest.clone()))
            .collect();
        self.subs.lock().insert(module.id().uuid(), subs);
    }

    fn detach(&self, module: &Module, _parent: Option<&Module>) {
        let subs = self.subs.lock().remove(&module.id().uuid());
        if let Some(subs) = subs {
            for sub in subs {
                module.bus().unsubscribe(sub);
            }
        }
    }
}
