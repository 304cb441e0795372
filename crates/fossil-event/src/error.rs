//! Event layer errors.

use fossil_types::ErrorCode;
use thiserror::Error;

/// Event bus error.
///
/// The bus itself is infallible; errors arise only on the capability
/// surface, when a [`PubSub`](crate::PubSub) facade outlives the bus it
/// was scoped from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The bus behind this handle has been dropped.
    ///
    /// Recoverable in the sense that reconnecting to a live bus (for a
    /// module, being connected to a new parent) replaces the handle.
    #[error("event bus is closed")]
    Closed,
}

impl ErrorCode for BusError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "BUS_CLOSED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Closed => true,
        }
    }
}
