//! Service layer errors.

use fossil_types::ErrorCode;
use thiserror::Error;

/// Structural misuse of a service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The requested canvas region was never declared.
    ///
    /// Regions are fixed at construction; asking for an unknown one is
    /// a programming error, not a runtime condition.
    #[error("unknown region: '{0}'")]
    UnknownRegion(String),
}

impl ErrorCode for ServiceError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownRegion(_) => "SERVICE_UNKNOWN_REGION",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::UnknownRegion(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fossil_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&[ServiceError::UnknownRegion("main".into())], "SERVICE_");
    }

    #[test]
    fn unknown_region_message() {
        let err = ServiceError::UnknownRegion("sidebar".into());
        assert!(err.to_string().contains("sidebar"));
        assert!(!err.is_recoverable());
    }
}
