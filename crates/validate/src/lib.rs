//! Tender validation
//!
//! Decides whether a tender notice is still open for bids. A tender whose
//! closing date lies on a UTC calendar day before today is rejected; every other
//! record passes.
//!
//! ## Rules
//!
//! - **Fail open** - a missing, `null`, non-string or unparsable closing date never
//!   blocks ingestion.
//! - **Fixed fallback zone** - closing dates without an offset are civil times at
//!   UTC+2 (configurable, no daylight saving) and are converted to UTC first.
//! - **Date granularity** - only the UTC calendar dates are compared, so a tender
//!   closing later today is still valid.
//!
//! ## Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//! use validate::{Validator, ValidatorConfig};
//!
//! let validator = Validator::new(ValidatorConfig::default()).unwrap();
//! let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
//!
//! let expired = json!({"tenderNumber": "RFQ-1", "closingDate": "2024-01-01"});
//! assert!(!validator.validate_at(&expired, now).is_valid());
//!
//! let open = json!({"tenderNumber": "RFQ-2", "closingDate": "2099-01-01T00:00:00+02:00"});
//! assert!(validator.validate_at(&open, now).is_valid());
//! ```
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde_json::Value;
use tracing::{info, warn};

mod closing;
mod config;
mod types;

pub use crate::closing::ClosingTimestamp;
pub use crate::config::{ConfigError, ValidatorConfig, DEFAULT_FALLBACK_OFFSET_SECS};
pub use crate::types::ValidationOutcome;

/// Stateless closing-date validator.
///
/// Holds only immutable configuration, so one instance can be shared freely
/// across tasks.
#[derive(Debug, Clone)]
pub struct Validator {
    cfg: ValidatorConfig,
    fallback: FixedOffset,
}

impl Validator {
    /// Builds a validator, rejecting inconsistent configuration up front.
    pub fn new(cfg: ValidatorConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let fallback = cfg.fallback_offset()?;
        Ok(Self { cfg, fallback })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.cfg
    }

    /// Validates `tender` against the current wall-clock time.
    pub fn validate(&self, tender: &Value) -> ValidationOutcome {
        self.validate_at(tender, Utc::now())
    }

    /// Validates `tender` as of `now`.
    ///
    /// Pure: the result depends only on the record, `now` and the configuration.
    pub fn validate_at(&self, tender: &Value, now: DateTime<Utc>) -> ValidationOutcome {
        let raw = match tender.get(&self.cfg.closing_date_field) {
            None | Some(Value::Null) => return ValidationOutcome::Valid,
            Some(raw) => raw,
        };

        let Some(text) = raw.as_str() else {
            warn!(
                closing_date = %raw,
                "closing date is not a string; tender will be processed"
            );
            return ValidationOutcome::Valid;
        };

        let Some(closing) = ClosingTimestamp::parse(text) else {
            warn!(
                closing_date = text,
                "could not parse closing date; tender will be processed"
            );
            return ValidationOutcome::Valid;
        };

        if !closing.is_qualified() {
            warn!(
                closing_date = text,
                offset_secs = self.cfg.fallback_offset_secs,
                "closing date has no offset; assuming fallback zone"
            );
        }

        let Some(closing_utc) = closing.to_utc(self.fallback) else {
            warn!(
                closing_date = text,
                "closing date could not be converted to UTC; tender will be processed"
            );
            return ValidationOutcome::Valid;
        };

        let closing_day = closing_utc.date_naive();
        let today = now.date_naive();
        if closing_day < today {
            let reason = closed_reason(closing_day, today);
            let tender_number = tender
                .get(&self.cfg.tender_number_field)
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            info!(
                tender_number,
                rules_version = self.cfg.version,
                reason = %reason,
                "rejecting closed tender"
            );
            return ValidationOutcome::Invalid { reason };
        }

        ValidationOutcome::Valid
    }
}

/// Rejection sentence naming both UTC dates.
pub fn closed_reason(closing_day: NaiveDate, today: NaiveDate) -> String {
    format!(
        "tender closed: closing date {} (UTC) is before today {} (UTC)",
        closing_day.format("%Y-%m-%d"),
        today.format("%Y-%m-%d")
    )
}
