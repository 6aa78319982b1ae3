//! Access-token refresh
//!
//! Handles the single token-endpoint interaction of the cookie-based session
//! scheme: POST to the refresh endpoint with no body. The refresh token is an
//! HTTP-only cookie set by the backend at login — the client never reads it,
//! it only needs a cookie-enabled HTTP client so the cookie is sent along.

use serde::{Deserialize, Serialize};

use crate::constants::REFRESH_PATH;
use crate::error::{Error, Result};

/// Response from the refresh endpoint.
///
/// The backend rotates the refresh cookie on its own; only the new access
/// token appears in the body.
#[derive(Debug, Deserialize, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Mint a new access token from the refresh-token cookie.
///
/// Called by the dispatcher's refresh coordinator when a request comes back
/// 401. A 401/403 from the refresh endpoint itself means the session is
/// definitively dead and the caller must clear all persisted credentials.
pub async fn refresh_session(client: &reqwest::Client, base_url: &str) -> Result<RefreshResponse> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH);
    let response = client
        .post(&url)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh cookie is missing, expired, or revoked
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenRefresh(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| Error::TokenRefresh(format!("invalid refresh response: {e}")))
}
