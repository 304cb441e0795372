//! Event modifiers: pattern-triggered dispatch rewriting.
//!
//! A modifier is a `(matcher, verbs, action)` triple. Before a bus
//! verb runs, the registered modifiers are scanned in registration
//! order, restricted to those applicable to that verb; the first whose
//! pattern matches the event name wins. The event name is rewritten to
//! the pattern's capture group, and for emissions the modifier's
//! action replaces normal dispatch entirely. For the other verbs a
//! match rewrites the name and normal behavior proceeds, which keeps
//! the `prefix!name` convention uniform across the whole verb surface.
//!
//! Plain-string matchers are normalized to the case-insensitive
//! pattern `^prefix!(.*)$`; a prebuilt [`Regex`] is used as-is.

use crate::{Arg, Bus, Emitted};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A bus verb, for restricting which calls a modifier applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    /// Subscribe.
    On,
    /// Subscribe once.
    Once,
    /// Unsubscribe by event name.
    Off,
    /// Emit.
    Emit,
    /// Subscribe on another bus, tracked for bulk teardown.
    ListenTo,
    /// Once-variant of [`ListenTo`](Self::ListenTo).
    ListenToOnce,
    /// Tear down all tracked foreign subscriptions.
    StopListening,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::On => "on",
            Self::Once => "once",
            Self::Off => "off",
            Self::Emit => "emit",
            Self::ListenTo => "listen_to",
            Self::ListenToOnce => "listen_to_once",
            Self::StopListening => "stop_listening",
        };
        f.write_str(name)
    }
}

/// The set of verbs a modifier intercepts.
#[derive(Debug, Clone, Default)]
pub enum VerbSet {
    /// Every verb.
    #[default]
    All,
    /// Only the listed verbs.
    Only(Vec<Verb>),
}

impl VerbSet {
    /// Restricts a modifier to the given verbs.
    #[must_use]
    pub fn only(verbs: impl Into<Vec<Verb>>) -> Self {
        Self::Only(verbs.into())
    }

    /// Returns `true` if `verb` is in the set.
    #[must_use]
    pub fn contains(&self, verb: Verb) -> bool {
        match self {
            Self::All => true,
            Self::Only(verbs) => verbs.contains(&verb),
        }
    }
}

/// A modifier matcher: either a plain prefix or a prebuilt pattern.
///
/// Prefixes are normalized to `^prefix!(.*)$`, case-insensitive, with
/// the remainder of the event name as the single capture group.
pub enum Matcher {
    /// Normalized to `^prefix!(.*)$`.
    Prefix(String),
    /// Used as-is; must expose the rewritten name as capture group 1.
    Pattern(Regex),
}

impl Matcher {
    pub(crate) fn into_regex(self) -> Regex {
        match self {
            Self::Prefix(prefix) => {
                Regex::new(&format!("(?i)^{}!(.*)$", regex::escape(&prefix)))
                    .expect("escaped modifier prefix compiles")
            }
            Self::Pattern(pattern) => pattern,
        }
    }
}

impl From<&str> for Matcher {
    fn from(prefix: &str) -> Self {
        Self::Prefix(prefix.to_string())
    }
}

impl From<String> for Matcher {
    fn from(prefix: String) -> Self {
        Self::Prefix(prefix)
    }
}

impl From<Regex> for Matcher {
    fn from(pattern: Regex) -> Self {
        Self::Pattern(pattern)
    }
}

/// A modifier's replacement dispatch strategy.
///
/// Invoked with the owning bus, the intercepted verb, the rewritten
/// event name, and the call's arguments. The returned [`Emitted`]
/// becomes the emission's return value.
pub type ModifierAction = Arc<dyn Fn(&Bus, Verb, &str, &[Arg]) -> Emitted + Send + Sync>;

/// A registered event modifier.
pub struct EventModifier {
    pattern: Regex,
    verbs: VerbSet,
    action: ModifierAction,
}

impl EventModifier {
    pub(crate) fn new(matcher: Matcher, verbs: VerbSet, action: ModifierAction) -> Self {
        Self {
            pattern: matcher.into_regex(),
            verbs,
            action,
        }
    }

    /// Returns the rewritten event name when this modifier applies to
    /// `verb` and its pattern matches `event`.
    pub(crate) fn rewrite(&self, verb: Verb, event: &str) -> Option<String> {
        if !self.verbs.contains(verb) {
            return None;
        }
        self.pattern.captures(event).map(|caps| {
            caps.get(1)
                .map(|group| group.as_str().to_string())
                .unwrap_or_default()
        })
    }

    pub(crate) fn action(&self) -> ModifierAction {
        Arc::clone(&self.action)
    }

    pub(crate) fn pattern_text(&self) -> &str {
        self.pattern.as_str()
    }
}

impl fmt::Debug for EventModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventModifier")
            .field("pattern", &self.pattern.as_str())
            .field("verbs", &self.verbs)
            .finish_non_exhaustive()
    }
}
