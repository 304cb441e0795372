//! Module tree errors.

use fossil_event::BusError;
use fossil_types::ErrorCode;
use thiserror::Error;

/// Structural misuse of the module tree.
///
/// These are programmer errors raised synchronously at the call site;
/// asynchronous lifecycle failures travel through the join's error
/// channel instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// A module cannot be its own child.
    #[error("cannot connect module '{0}' to itself")]
    SelfConnect(String),

    /// The child already has a live parent; disconnect it first.
    #[error("module '{0}' is already connected to a parent")]
    AlreadyConnected(String),

    /// The parent bus behind this module's handle is gone.
    #[error("parent bus unavailable: {0}")]
    ParentUnavailable(#[from] BusError),
}

impl ErrorCode for ModuleError {
    fn code(&self) -> &'static str {
        match self {
            Self::SelfConnect(_) => "MODULE_SELF_CONNECT",
            Self::AlreadyConnected(_) => "MODULE_ALREADY_CONNECTED",
            Self::ParentUnavailable(_) => "MODULE_PARENT_UNAVAILABLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::SelfConnect(_) | Self::AlreadyConnected(_) => false,
            // A reconnect installs a live parent handle.
            Self::ParentUnavailable(_) => true,
        }
    }
}
