//! Base-URL resolution and client tuning knobs
//!
//! In production deployments the API is served from the same origin as the
//! application, so the caller's origin is reused verbatim. When the
//! application itself runs on a local-development hostname, requests go to a
//! fixed local backend origin instead — overridable through the
//! `DIVEMAP_API_URL` environment variable, but only when the override itself
//! points at `http://localhost` (anything else is ignored rather than
//! trusted).

use std::time::Duration;

use divemap_auth::constants::DEFAULT_LOCAL_API_URL;
use tracing::warn;

/// Environment variable overriding the local-development backend origin.
pub const API_URL_ENV: &str = "DIVEMAP_API_URL";

/// Whether a hostname counts as local development.
///
/// Recognized: `localhost`, loopback, and the private-network prefixes
/// `192.168.` / `10.`.
pub fn is_local_hostname(host: &str) -> bool {
    host == "localhost"
        || host == "127.0.0.1"
        || host.starts_with("192.168.")
        || host.starts_with("10.")
}

/// Resolve the API base URL for an application served from `origin`.
///
/// Local-development origins resolve to the fixed local backend origin (or
/// the `env_override` if it passes the localhost check); any other origin is
/// reused as-is, so the deployment's own scheme and host serve the API.
pub fn resolve_api_base(origin: &str, env_override: Option<&str>) -> String {
    if is_local_hostname(hostname_of(origin)) {
        if let Some(override_url) = env_override {
            if override_url.starts_with("http://localhost") {
                return override_url.trim_end_matches('/').to_string();
            }
            warn!(
                override_url,
                "ignoring {API_URL_ENV}: override must point at http://localhost"
            );
        }
        return DEFAULT_LOCAL_API_URL.to_string();
    }
    origin.trim_end_matches('/').to_string()
}

/// Extract the hostname from an origin string (scheme and port stripped).
fn hostname_of(origin: &str) -> &str {
    let rest = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let host_port = rest.split(['/', '?']).next().unwrap_or(rest);
    host_port.split(':').next().unwrap_or(host_port)
}

/// Tuning knobs for the dispatcher's recovery policies.
///
/// The defaults are the production values; tests shrink the delays so the
/// backoff schedule can be exercised without wall-clock waits.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Transient-failure retry ceiling (retries, not total attempts)
    pub retry_max_attempts: u32,
    /// First backoff delay; doubles on each subsequent retry
    pub retry_base_delay: Duration,
    /// Backoff cap
    pub retry_max_delay: Duration,
    /// Health-check request timeout
    pub health_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(10),
            health_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_and_loopback_are_local() {
        assert!(is_local_hostname("localhost"));
        assert!(is_local_hostname("127.0.0.1"));
    }

    #[test]
    fn private_network_prefixes_are_local() {
        assert!(is_local_hostname("192.168.1.20"));
        assert!(is_local_hostname("10.0.0.5"));
    }

    #[test]
    fn public_hostnames_are_not_local() {
        assert!(!is_local_hostname("divemap.example.com"));
        assert!(!is_local_hostname("203.0.113.7"));
        // "10." must be a prefix of the host, not a substring
        assert!(!is_local_hostname("110.0.0.1"));
    }

    #[test]
    fn production_origin_is_reused_verbatim() {
        assert_eq!(
            resolve_api_base("https://divemap.example.com", None),
            "https://divemap.example.com"
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(
            resolve_api_base("https://divemap.example.com/", None),
            "https://divemap.example.com"
        );
    }

    #[test]
    fn local_origin_resolves_to_local_backend() {
        assert_eq!(
            resolve_api_base("http://localhost:3000", None),
            DEFAULT_LOCAL_API_URL
        );
        assert_eq!(
            resolve_api_base("http://192.168.1.20:3000", None),
            DEFAULT_LOCAL_API_URL
        );
    }

    #[test]
    fn localhost_override_is_accepted() {
        assert_eq!(
            resolve_api_base("http://localhost:3000", Some("http://localhost:9000")),
            "http://localhost:9000"
        );
    }

    #[test]
    fn non_localhost_override_is_ignored() {
        assert_eq!(
            resolve_api_base("http://localhost:3000", Some("https://evil.example.com")),
            DEFAULT_LOCAL_API_URL
        );
    }

    #[test]
    fn override_has_no_effect_on_production_origins() {
        assert_eq!(
            resolve_api_base("https://divemap.example.com", Some("http://localhost:9000")),
            "https://divemap.example.com"
        );
    }

    #[test]
    fn default_options_match_policy() {
        let opts = ClientOptions::default();
        assert_eq!(opts.retry_max_attempts, 3);
        assert_eq!(opts.retry_base_delay, Duration::from_secs(1));
        assert_eq!(opts.retry_max_delay, Duration::from_secs(10));
        assert_eq!(opts.health_timeout, Duration::from_secs(5));
    }
}
