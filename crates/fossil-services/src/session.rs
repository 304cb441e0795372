//! In-memory session storage.
//!
//! A shallow service: the store lives on the service object, so every
//! module the service is attached to shares the same values. Exposed
//! operations make the store reachable over the host module's bus
//! without a direct reference:
//!
//! ```
//! use fossil_event::Arg;
//! use fossil_module::Module;
//! use fossil_services::SessionService;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let shell = Module::new("shell");
//! shell.use_service("session", Arc::new(SessionService::new())).unwrap();
//!
//! shell.bus().emit("one!session:set", vec![Arg::json("user"), Arg::json("ada")]);
//! let reply = shell.bus().emit("one!session:get", vec![Arg::json("user")]);
//! assert_eq!(reply.into_first().unwrap().as_json().unwrap(), &json!("ada"));
//! ```

use chrono::{DateTime, Utc};
use fossil_event::Arg;
use fossil_module::Service;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Key/value session store with a touched-at timestamp.
#[derive(Default)]
pub struct SessionService {
    values: Mutex<HashMap<String, Value>>,
    touched: Mutex<Option<DateTime<Utc>>>,
}

impl SessionService {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    /// Writes a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        let previous = self.values.lock().insert(key.into(), value);
        *self.touched.lock() = Some(Utc::now());
        previous
    }

    /// Removes and returns a value.
    pub fn take(&self, key: &str) -> Option<Value> {
        let removed = self.values.lock().remove(key);
        if removed.is_some() {
            *self.touched.lock() = Some(Utc::now());
        }
        removed
    }

    /// Clears the store, returning the number of removed entries.
    pub fn clear(&self) -> usize {
        let mut values = self.values.lock();
        let count = values.len();
        values.clear();
        *self.touched.lock() = Some(Utc::now());
        debug!(cleared = count, "session cleared");
        count
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Returns `true` when the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Timestamp of the last mutation, if any.
    #[must_use]
    pub fn touched_at(&self) -> Option<DateTime<Utc>> {
        *self.touched.lock()
    }
}

impl Service for SessionService {
    fn name(&self) -> &str {
        "session"
    }

    fn exposed(&self) -> &[&str] {
        &["session:get", "session:set", "session:take", "session:clear"]
    }

    fn call(&self, op: &str, args: &[Arg]) -> Option<Arg> {
        match op {
            "session:get" => {
                let key = args.first().and_then(Arg::as_str)?;
                Some(Arg::Json(self.get(key).unwrap_or(Value::Null)))
            }
            "session:set" => {
                let key = args.first().and_then(Arg::as_str)?.to_string();
                let value = args.get(1).and_then(Arg::as_json).cloned()?;
                let previous = self.set(key, value);
                Some(Arg::Json(previous.unwrap_or(Value::Null)))
            }
            "session:take" => {
                let key = args.first().and_then(Arg::as_str)?;
                Some(Arg::Json(self.take(key).unwrap_or(Value::Null)))
            }
            "session:clear" => Some(Arg::json(self.clear())),
            _ => None,
        }
    }
}
