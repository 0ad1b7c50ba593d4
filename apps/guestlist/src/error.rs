//! Errors raised while turning a submission into event records.

use thiserror::Error;

/// Reasons an event submission is rejected.
///
/// Every variant is detected before anything is persisted, so a rejected
/// submission never leaves a partial series behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    /// A required field is missing or a value is malformed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Capacity below zero
    #[error("Invalid capacity {0}: capacity cannot be negative")]
    InvalidCapacity(i64),

    /// A recurrence rule without a usable end date, or one that expands to
    /// no occurrences or to too many
    #[error("Invalid recurrence bounds: {0}")]
    RecurrenceBounds(String),
}

impl IntakeError {
    /// Shorthand for a validation failure
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status a request handler should answer with
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        400
    }

    /// Stable machine-readable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidCapacity(_) => "INVALID_CAPACITY",
            Self::RecurrenceBounds(_) => "RECURRENCE_BOUNDS",
        }
    }
}
