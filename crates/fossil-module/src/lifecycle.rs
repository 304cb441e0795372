//! Lifecycle phases.
//!
//! ```text
//! Idle ──start──► Running ◄──start── Standby
//!                    │    ──standby──►  │
//!                    └──────stop────────┴──► Stopped
//! ```
//!
//! `stop` always funnels through standby, fires once the module's
//! pending asynchronous work settles, and resets the first-start
//! tracking, so a later `start` opens a new epoch and fires
//! `start:first` again.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Never started in this epoch.
    #[default]
    Idle,
    /// Actively running.
    Running,
    /// Paused; can start again without a new epoch.
    Standby,
    /// Stopped; the next start opens a new epoch.
    Stopped,
}

impl Phase {
    /// Returns `true` while running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` once stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Standby => "standby",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Phase plus first-start tracking, owned by a module.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LifeState {
    pub phase: Phase,
    pub ever_started: bool,
}
