//! Coordination errors.

use fossil_types::ErrorCode;
use thiserror::Error;

/// Failure of a tracked operation or of the join itself.
///
/// | Variant | When | Recoverable |
/// |---------|------|-------------|
/// | [`Timeout`](Self::Timeout) | operation missed its window | yes |
/// | [`Aborted`](Self::Aborted) | join torn down by `abort` | no |
/// | [`Failed`](Self::Failed) | operation reported its own failure | no |
/// | [`JoinFailed`](Self::JoinFailed) | fail-silent join found failures after all settled | no |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The operation did not settle within its configured window.
    ///
    /// Recoverable: the underlying work may simply be slow; retrying
    /// with a wider window can succeed.
    #[error("operation timed out")]
    Timeout,

    /// The join was aborted before the operation settled.
    #[error("aborted: {0}")]
    Aborted(String),

    /// The operation itself failed with the given message.
    #[error("operation failed: {0}")]
    Failed(String),

    /// One or more operations failed; reported once all of them had
    /// settled (the fail-silent policy).
    #[error("some asynchronous process failed")]
    JoinFailed,
}

impl ErrorCode for WaitError {
    fn code(&self) -> &'static str {
        match self {
            Self::Timeout => "WAIT_TIMEOUT",
            Self::Aborted(_) => "WAIT_ABORTED",
            Self::Failed(_) => "WAIT_FAILED",
            Self::JoinFailed => "WAIT_JOIN_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
