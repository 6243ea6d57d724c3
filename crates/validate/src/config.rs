//! Configuration types for tender validation.
//!
//! [`ValidatorConfig`] controls which JSON fields the validator reads and which
//! fixed UTC offset is assumed for closing dates that carry no zone information.
//! It is cheap to clone and deserializes from JSON, TOML or YAML.
//!
//! # Quick Start
//!
//! ```rust
//! use validate::ValidatorConfig;
//!
//! let config = ValidatorConfig::default();
//! config.validate().expect("default config is valid");
//! assert_eq!(config.fallback_offset_secs, 2 * 3600);
//! ```
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Offset applied to unqualified timestamps: UTC+2, no daylight-saving transitions.
pub const DEFAULT_FALLBACK_OFFSET_SECS: i32 = 2 * 3600;

/// Runtime configuration for the closing-date validator.
///
/// # Serialization
///
/// ```yaml
/// version: 1
/// closing_date_field: closingDate
/// tender_number_field: tenderNumber
/// fallback_offset_secs: 7200
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Version of the validation rules. Bump when rejection semantics change.
    ///
    /// Default: `1`
    pub version: u32,

    /// JSON field holding the closing date/time.
    ///
    /// Default: `"closingDate"`
    pub closing_date_field: String,

    /// JSON field holding the tender number. Only used for log context.
    ///
    /// Default: `"tenderNumber"`
    pub tender_number_field: String,

    /// Seconds east of UTC assumed for closing dates without an explicit offset.
    ///
    /// The offset is fixed: no daylight-saving rules are applied. Must lie strictly
    /// within ±24 hours.
    ///
    /// Default: `7200` (UTC+2)
    pub fallback_offset_secs: i32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            version: 1,
            closing_date_field: "closingDate".into(),
            tender_number_field: "tenderNumber".into(),
            fallback_offset_secs: DEFAULT_FALLBACK_OFFSET_SECS,
        }
    }
}

impl ValidatorConfig {
    /// Validates internal consistency of this configuration.
    ///
    /// Intended for process start-up, before any message is handled.
    ///
    /// ```rust
    /// use validate::{ConfigError, ValidatorConfig};
    ///
    /// let bad = ValidatorConfig {
    ///     fallback_offset_secs: 25 * 3600,
    ///     ..Default::default()
    /// };
    /// assert!(matches!(bad.validate(), Err(ConfigError::OffsetOutOfRange(_))));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.closing_date_field.trim().is_empty() {
            return Err(ConfigError::EmptyFieldName("closing_date_field"));
        }
        if self.tender_number_field.trim().is_empty() {
            return Err(ConfigError::EmptyFieldName("tender_number_field"));
        }
        self.fallback_offset()?;
        Ok(())
    }

    /// The configured fallback offset as a [`FixedOffset`].
    pub fn fallback_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.fallback_offset_secs)
            .ok_or(ConfigError::OffsetOutOfRange(self.fallback_offset_secs))
    }
}

/// Errors raised when a [`ValidatorConfig`] is inconsistent.
///
/// These are configuration-time problems and should surface during start-up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The fallback offset is not representable as a fixed UTC offset.
    #[error("fallback offset of {0} seconds is outside the valid range of ±86399 seconds")]
    OffsetOutOfRange(i32),

    /// A field name was configured as blank.
    #[error("{0} must not be empty")]
    EmptyFieldName(&'static str),
}
