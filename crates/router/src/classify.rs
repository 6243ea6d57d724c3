use cache::DedupCache;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info, warn};
use validate::{ValidationOutcome, Validator};

use crate::queue::RawMessage;

/// Payload field naming the publishing source.
pub const SOURCE_FIELD: &str = "source";

/// Payload field naming the tender number.
pub const TENDER_NUMBER_FIELD: &str = "tenderNumber";

/// Where a single message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Forward to the accepted stream.
    Accepted { body: String },
    /// Unusable or expired. `reason` is `None` when the body was not a JSON
    /// object, in which case it is forwarded unannotated.
    Rejected {
        body: String,
        reason: Option<String>,
    },
    /// Already ingested.
    Duplicate { body: String },
    /// Could not be decided now; leave it on the source queue.
    Deferred { error: String },
}

impl MessageOutcome {
    /// Whether the message reached a final decision and may be deleted.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageOutcome::Deferred { .. })
    }
}

fn string_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Decides the outcome of `message` as of `now`.
///
/// Synchronous and free of I/O: the cache must already be populated, and a
/// cache error defers the message instead of guessing.
pub fn classify_message(
    message: &RawMessage,
    validator: &Validator,
    cache: &DedupCache,
    now: DateTime<Utc>,
) -> MessageOutcome {
    let parsed = match serde_json::from_str::<Value>(&message.body) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            error!(
                message_id = %message.id,
                "message body is not a JSON object; sending to rejected queue"
            );
            return MessageOutcome::Rejected {
                body: message.body.clone(),
                reason: None,
            };
        }
        Err(err) => {
            error!(
                message_id = %message.id,
                error = %err,
                "failed to parse message JSON; sending to rejected queue"
            );
            return MessageOutcome::Rejected {
                body: message.body.clone(),
                reason: None,
            };
        }
    };

    if let ValidationOutcome::Invalid { reason } = validator.validate_at(&parsed, now) {
        return MessageOutcome::Rejected {
            body: message.body.clone(),
            reason: Some(reason),
        };
    }

    let (Some(source), Some(tender_number)) = (
        string_field(&parsed, SOURCE_FIELD),
        string_field(&parsed, TENDER_NUMBER_FIELD),
    ) else {
        warn!(
            message_id = %message.id,
            "message is missing 'tenderNumber' or 'source'; treating as unique"
        );
        return MessageOutcome::Accepted {
            body: message.body.clone(),
        };
    };

    match cache.is_duplicate(source, tender_number) {
        Ok(true) => {
            info!(source, tender_number, "duplicate tender found");
            MessageOutcome::Duplicate {
                body: message.body.clone(),
            }
        }
        Ok(false) => MessageOutcome::Accepted {
            body: message.body.clone(),
        },
        Err(err) => {
            error!(
                message_id = %message.id,
                error = %err,
                "unexpected error processing message; it will be retried after the visibility timeout"
            );
            MessageOutcome::Deferred {
                error: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cache::InMemoryRepository;
    use chrono::TimeZone;
    use validate::ValidatorConfig;

    use super::*;

    fn now() -> DateTime<Utc> {
        let Some(now) = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single() else {
            panic!("invalid timestamp");
        };
        now
    }

    fn validator() -> Validator {
        Validator::new(ValidatorConfig::default()).expect("default config")
    }

    async fn loaded_cache() -> DedupCache {
        let repo = InMemoryRepository::new().with_source("SARS", ["RFQ-001"]);
        let cache = DedupCache::new(Arc::new(repo));
        cache.ensure_loaded().await.expect("population succeeds");
        cache
    }

    fn msg(body: &str) -> RawMessage {
        RawMessage::new("m1", "h1", body)
    }

    #[tokio::test]
    async fn outcomes_cover_every_path() {
        let cache = loaded_cache().await;
        let v = validator();

        let malformed = classify_message(&msg("{oops"), &v, &cache, now());
        assert_eq!(
            malformed,
            MessageOutcome::Rejected {
                body: "{oops".into(),
                reason: None
            }
        );

        let array = classify_message(&msg("[1,2]"), &v, &cache, now());
        assert!(matches!(array, MessageOutcome::Rejected { reason: None, .. }));

        let expired = classify_message(
            &msg(r#"{"source":"SARS","tenderNumber":"RFQ-002","closingDate":"2024-01-01"}"#),
            &v,
            &cache,
            now(),
        );
        assert!(matches!(
            expired,
            MessageOutcome::Rejected { reason: Some(ref r), .. } if r.contains("2024-01-01")
        ));

        let dup = classify_message(
            &msg(r#"{"source":"sars","tenderNumber":"rfq-001"}"#),
            &v,
            &cache,
            now(),
        );
        assert!(matches!(dup, MessageOutcome::Duplicate { .. }));

        let fresh = classify_message(
            &msg(r#"{"source":"SARS","tenderNumber":"RFQ-777"}"#),
            &v,
            &cache,
            now(),
        );
        assert!(matches!(fresh, MessageOutcome::Accepted { .. }));
    }

    #[tokio::test]
    async fn blank_or_non_string_identity_is_accepted() {
        let cache = loaded_cache().await;
        let v = validator();
        for body in [
            r#"{"source":"SARS"}"#,
            r#"{"source":"  ","tenderNumber":"RFQ-001"}"#,
            r#"{"source":"SARS","tenderNumber":1}"#,
            r#"{}"#,
        ] {
            let outcome = classify_message(&msg(body), &v, &cache, now());
            assert_eq!(
                outcome,
                MessageOutcome::Accepted { body: body.into() },
                "{body}"
            );
        }
    }

    #[test]
    fn unloaded_cache_defers() {
        let cache = DedupCache::new(Arc::new(InMemoryRepository::new()));
        let outcome = classify_message(
            &msg(r#"{"source":"SARS","tenderNumber":"RFQ-001"}"#),
            &validator(),
            &cache,
            now(),
        );
        assert!(matches!(outcome, MessageOutcome::Deferred { .. }));
        assert!(!outcome.is_terminal());
    }
}
