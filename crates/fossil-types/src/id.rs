//! Identifier types for Fossil.
//!
//! All identifiers are UUID v4 based so they stay unique across buses,
//! modules, and join generations without central coordination.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for an event bus instance.
///
/// Used to track cross-bus subscriptions (`listen_to` bookkeeping) and
/// to label dispatch traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusId(Uuid);

impl BusId {
    /// Creates a fresh bus identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BusId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus:{}", short(&self.0))
    }
}

/// Identifier for a single bus subscription.
///
/// Returned by the subscribe verbs and accepted by `unsubscribe` for
/// targeted removal. Once-subscriptions are removed by id after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Creates a fresh subscription identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", short(&self.0))
    }
}

/// Generation identifier for a wait join.
///
/// Every join generation gets a fresh id, and settlements tag the
/// generation they belong to. A settlement arriving after the join was
/// torn down carries a stale id and is discarded, which is what keeps a
/// late resolution from leaking into a newer join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitId(Uuid);

impl WaitId {
    /// Creates a fresh generation identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WaitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WaitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wait:{}", short(&self.0))
    }
}

/// Identifier for a module in the composition tree.
///
/// Carries a human-readable name alongside the UUID. The name is the
/// label a module was built with; the id a parent stores a child under
/// is chosen at connect time and is not part of this type.
///
/// # Example
///
/// ```
/// use fossil_types::ModuleId;
///
/// let a = ModuleId::named("shell");
/// let b = ModuleId::named("shell");
///
/// assert_eq!(a.name(), "shell");
/// assert_ne!(a, b); // separate instances, separate identities
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId {
    uuid: Uuid,
    name: String,
}

impl ModuleId {
    /// Creates a module identifier with the given display name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, short(&self.uuid))
    }
}

/// First UUID group, enough to tell instances apart in logs.
fn short(uuid: &Uuid) -> String {
    let text = uuid.to_string();
    text.split('-').next().unwrap_or(&text).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_ids_are_unique() {
        assert_ne!(BusId::new(), BusId::new());
    }

    #[test]
    fn subscription_ids_are_unique() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }

    #[test]
    fn wait_ids_are_unique() {
        assert_ne!(WaitId::new(), WaitId::new());
    }

    #[test]
    fn module_id_keeps_name() {
        let id = ModuleId::named("sidebar");
        assert_eq!(id.name(), "sidebar");
        assert!(id.to_string().starts_with("sidebar#"));
    }

    #[test]
    fn module_ids_with_same_name_differ() {
        let a = ModuleId::named("shell");
        let b = ModuleId::named("shell");
        assert_ne!(a, b);
        assert_ne!(a.uuid(), b.uuid());
    }

    #[test]
    fn ids_roundtrip_serde() {
        let id = ModuleId::named("shell");
        let json = serde_json::to_string(&id).unwrap();
        let back: ModuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn display_is_short() {
        let id = BusId::new();
        // "bus:" plus the first uuid group
        assert_eq!(id.to_string().len(), 4 + 8);
    }
}
