//! Transient-failure retry policy
//!
//! Absorbs intermittent network and server failures before they reach the
//! caller. A failure is retryable when there was no response at all
//! (transport error, timeout) or the status is a 5xx — 504 included. 401 and
//! 429 have dedicated paths in the dispatcher and never enter this policy.
//!
//! Attempt counts are tracked per request identity (method + path + query),
//! not per call instance, so concurrent calls to the same endpoint share a
//! counter. Entries are removed on every terminal path — success,
//! exhaustion, or a non-retryable outcome — so the map never grows without
//! bound.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;

/// Whether an HTTP status falls under the transient-retry policy.
///
/// 401 (session expiry) and 429 (rate limit) are handled by their own
/// dispatcher paths and are deliberately not retryable here.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    status >= 500
}

/// Exponential backoff for the given prior-attempt count: `base * 2^attempt`,
/// capped at `max`. With the default knobs this is 1s, 2s, 4s, then the 10s
/// cap.
pub(crate) fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exp = attempt.min(16);
    base.saturating_mul(1u32 << exp).min(max)
}

/// Per-identity transient-retry attempt counts.
pub(crate) struct RetryTracker {
    counts: Mutex<HashMap<String, u32>>,
}

impl RetryTracker {
    pub(crate) fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Current attempt count for an identity (0 when untracked).
    pub(crate) async fn attempts(&self, identity: &str) -> u32 {
        let counts = self.counts.lock().await;
        counts.get(identity).copied().unwrap_or(0)
    }

    /// Record one more attempt and return the new count.
    pub(crate) async fn record(&self, identity: &str) -> u32 {
        let mut counts = self.counts.lock().await;
        let count = counts.entry(identity.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop the identity's entry. Called on every terminal outcome.
    pub(crate) async fn clear(&self, identity: &str) {
        let mut counts = self.counts.lock().await;
        counts.remove(identity);
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.counts.lock().await.len()
    }
}
