//! Validation outcome type.
use serde::{Deserialize, Serialize};

/// Result of validating a single tender record.
///
/// The `Invalid` reason is a human-readable sentence rather than a code: it is
/// echoed verbatim into the rejected payload so downstream consumers can see why
/// a tender was dropped.
///
/// ```rust
/// use validate::ValidationOutcome;
///
/// let outcome = ValidationOutcome::invalid("closed");
/// assert!(!outcome.is_valid());
/// assert_eq!(outcome.reason(), Some("closed"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The tender may proceed.
    Valid,
    /// The tender must be rejected.
    Invalid {
        /// Why the tender was rejected.
        reason: String,
    },
}

impl ValidationOutcome {
    /// Builds an `Invalid` outcome.
    pub fn invalid(reason: impl Into<String>) -> Self {
        ValidationOutcome::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Valid => None,
            ValidationOutcome::Invalid { reason } => Some(reason.as_str()),
        }
    }
}
