//! Divemap API path constants
//!
//! Fixed paths of the backend REST surface that the auth layer and the
//! dispatcher need to recognize. The three login-family endpoints are listed
//! separately because a 401 from them must fail directly instead of starting
//! a token-refresh cycle.

/// Token refresh endpoint. The refresh token rides an HTTP-only cookie, so
/// the request carries no body.
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

/// Password login endpoint
pub const LOGIN_PATH: &str = "/api/v1/auth/login";

/// Account registration endpoint
pub const REGISTER_PATH: &str = "/api/v1/auth/register";

/// Google social login endpoint
pub const GOOGLE_LOGIN_PATH: &str = "/api/v1/auth/google-login";

/// Liveness keepalive endpoint (queried with `?frontend=true`)
pub const HEALTH_PATH: &str = "/health";

/// Backend origin used when the application itself is served from a
/// local-development hostname.
pub const DEFAULT_LOCAL_API_URL: &str = "http://localhost:8000";

/// Endpoints whose 401 responses never trigger a refresh cycle.
pub const AUTH_BYPASS_PATHS: &[&str] = &[LOGIN_PATH, REGISTER_PATH, GOOGLE_LOGIN_PATH];

/// Whether a request path is one of the login-family endpoints.
///
/// Matches on the path component only; any query string is ignored.
pub fn is_auth_endpoint(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    AUTH_BYPASS_PATHS.iter().any(|p| *p == path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_family_is_bypassed() {
        assert!(is_auth_endpoint(LOGIN_PATH));
        assert!(is_auth_endpoint(REGISTER_PATH));
        assert!(is_auth_endpoint(GOOGLE_LOGIN_PATH));
    }

    #[test]
    fn query_string_is_ignored() {
        assert!(is_auth_endpoint("/api/v1/auth/login?redirect=/profile"));
    }

    #[test]
    fn other_paths_are_not_bypassed() {
        assert!(!is_auth_endpoint("/api/v1/dive-sites/"));
        assert!(!is_auth_endpoint("/api/v1/auth/me"));
        // The refresh endpoint is called directly, never dispatched, so it
        // does not need to be in the bypass list.
        assert!(!is_auth_endpoint(REFRESH_PATH));
    }
}
