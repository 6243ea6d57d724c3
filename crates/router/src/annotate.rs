use serde_json::Value;

/// Field added to rejected payloads.
pub const FAILURE_REASON_FIELD: &str = "failureReason";

/// Reason written into duplicate payloads.
pub const DUPLICATE_REASON: &str = "duplicate";

/// Returns `body` with `failureReason` set to `reason`.
///
/// Only JSON objects are rewritten; field order is kept and an existing
/// `failureReason` is overwritten. Any other body, including invalid JSON,
/// comes back byte-for-byte unchanged.
///
/// ```rust
/// use router::annotate_failure;
///
/// let out = annotate_failure(r#"{"source":"SARS"}"#, "duplicate");
/// assert_eq!(out, r#"{"source":"SARS","failureReason":"duplicate"}"#);
/// assert_eq!(annotate_failure("[1, 2]", "duplicate"), "[1, 2]");
/// ```
pub fn annotate_failure(body: &str, reason: &str) -> String {
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    object.insert(
        FAILURE_REASON_FIELD.to_string(),
        Value::String(reason.to_string()),
    );
    serde_json::to_string(&Value::Object(object)).unwrap_or_else(|_| body.to_string())
}
