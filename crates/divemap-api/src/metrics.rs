//! Metrics for the dispatcher's recovery paths
//!
//! Counters emitted through the `metrics` facade:
//!
//! - `api_requests_total` (counter): labels `status`, `method`
//! - `api_token_refreshes_total` (counter): label `outcome`
//! - `api_transient_retries_total` (counter): label `status`
//! - `api_rate_limited_total` (counter)
//!
//! The library never installs a recorder; without one these calls are no-ops.

/// Record a settled dispatch with its final status code and HTTP method.
pub(crate) fn record_request(status: u16, method: &str) {
    metrics::counter!(
        "api_requests_total",
        "status" => status.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}

/// Record a refresh cycle outcome ("success" or "failure").
pub(crate) fn record_refresh(outcome: &str) {
    metrics::counter!("api_token_refreshes_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record one scheduled transient retry. `status` is absent for transport
/// errors with no response.
pub(crate) fn record_transient_retry(status: Option<u16>) {
    let label = status.map_or_else(|| "network".to_string(), |code| code.to_string());
    metrics::counter!("api_transient_retries_total", "status" => label).increment(1);
}

/// Record a 429 surfaced to a caller.
pub(crate) fn record_rate_limited() {
    metrics::counter!("api_rate_limited_total").increment(1);
}
