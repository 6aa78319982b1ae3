//! Rate-limit annotation
//!
//! 429 responses are never retried on the caller's behalf — the wait decision
//! belongs to the caller/user. The dispatcher only extracts how long the
//! backend asked to wait and attaches it to the rejection.

use serde_json::Value;

/// Seconds to report when the backend names no wait at all.
pub(crate) const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Resolve the retry-after value for a 429 response.
///
/// Precedence: `retry-after` header as integer seconds, then a `retry_after`
/// body field, then the 30-second default.
pub(crate) fn retry_after_from(header: Option<&str>, body: &Value) -> u64 {
    if let Some(seconds) = header.and_then(|value| value.trim().parse::<u64>().ok()) {
        return seconds;
    }
    if let Some(seconds) = body.get("retry_after").and_then(Value::as_u64) {
        return seconds;
    }
    DEFAULT_RETRY_AFTER_SECS
}
