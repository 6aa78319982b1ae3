//! Thin REST endpoint helpers
//!
//! Each helper is a one-line mapping from a function call to a verb + path +
//! payload; all recovery behavior lives in the dispatcher. Payloads and
//! responses are `serde_json::Value` pass-throughs — the backend owns the
//! schemas.

use divemap_auth::constants::{
    GOOGLE_LOGIN_PATH, HEALTH_PATH, LOGIN_PATH, REGISTER_PATH,
};
use serde_json::Value;
use tracing::warn;

use crate::client::{ApiClient, ApiRequest, MultipartField};
use crate::error::Result;

impl ApiClient {
    /// Liveness keepalive: `GET /health?frontend=true`.
    ///
    /// Carries its own short timeout and swallows every failure — including
    /// the timeout itself — returning `None`. This endpoint is non-critical
    /// traffic and must never surface an error.
    pub async fn health_check(&self) -> Option<Value> {
        let url = format!("{}{}?frontend=true", self.base_url(), HEALTH_PATH);
        let response = self
            .http()
            .get(&url)
            .timeout(self.options().health_timeout)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }

    /// Password login. A 401 here fails directly — it never triggers a
    /// refresh cycle.
    pub async fn login(&self, payload: Value) -> Result<Value> {
        let response = self.post(LOGIN_PATH, payload).await?;
        self.store_session_fields(&response).await;
        Ok(response)
    }

    /// Account registration.
    pub async fn register(&self, payload: Value) -> Result<Value> {
        let response = self.post(REGISTER_PATH, payload).await?;
        self.store_session_fields(&response).await;
        Ok(response)
    }

    /// Google social login.
    pub async fn google_login(&self, payload: Value) -> Result<Value> {
        let response = self.post(GOOGLE_LOGIN_PATH, payload).await?;
        self.store_session_fields(&response).await;
        Ok(response)
    }

    /// Client-side logout: clear every persisted credential.
    pub async fn logout(&self) -> Result<()> {
        self.session()
            .clear()
            .await
            .map_err(|e| crate::error::ApiError::Transport(format!("clearing session: {e}")))
    }

    /// Global full-text search.
    pub async fn search(&self, q: &str, limit: u32) -> Result<Value> {
        self.get_with_query("/api/v1/search/", &[("q", q), ("limit", &limit.to_string())])
            .await
    }

    // --- Dive sites ---

    pub async fn dive_sites(&self, query: &[(&str, &str)]) -> Result<Value> {
        self.get_with_query("/api/v1/dive-sites/", query).await
    }

    pub async fn dive_site(&self, id: u64) -> Result<Value> {
        self.get(&format!("/api/v1/dive-sites/{id}")).await
    }

    pub async fn create_dive_site(&self, payload: Value) -> Result<Value> {
        self.post("/api/v1/dive-sites/", payload).await
    }

    pub async fn update_dive_site(&self, id: u64, payload: Value) -> Result<Value> {
        self.put(&format!("/api/v1/dive-sites/{id}"), payload).await
    }

    pub async fn delete_dive_site(&self, id: u64) -> Result<Value> {
        self.delete(&format!("/api/v1/dive-sites/{id}")).await
    }

    /// Upload media for a dive site (multipart).
    pub async fn upload_dive_site_media(
        &self,
        id: u64,
        fields: Vec<MultipartField>,
    ) -> Result<Value> {
        Ok(self
            .execute(
                ApiRequest::new(reqwest::Method::POST, format!("/api/v1/dive-sites/{id}/media"))
                    .multipart(fields),
            )
            .await?
            .into_json())
    }

    pub async fn dive_site_media(&self, id: u64) -> Result<Value> {
        self.get(&format!("/api/v1/dive-sites/{id}/media")).await
    }

    // --- Diving centers ---

    pub async fn diving_centers(&self, query: &[(&str, &str)]) -> Result<Value> {
        self.get_with_query("/api/v1/diving-centers/", query).await
    }

    pub async fn diving_center(&self, id: u64) -> Result<Value> {
        self.get(&format!("/api/v1/diving-centers/{id}")).await
    }

    pub async fn create_diving_center(&self, payload: Value) -> Result<Value> {
        self.post("/api/v1/diving-centers/", payload).await
    }

    pub async fn update_diving_center(&self, id: u64, payload: Value) -> Result<Value> {
        self.put(&format!("/api/v1/diving-centers/{id}"), payload)
            .await
    }

    pub async fn delete_diving_center(&self, id: u64) -> Result<Value> {
        self.delete(&format!("/api/v1/diving-centers/{id}")).await
    }

    // --- Tags ---

    pub async fn tags(&self) -> Result<Value> {
        self.get("/api/v1/tags/").await
    }

    pub async fn create_tag(&self, payload: Value) -> Result<Value> {
        self.post("/api/v1/tags/", payload).await
    }

    pub async fn update_tag(&self, id: u64, payload: Value) -> Result<Value> {
        self.put(&format!("/api/v1/tags/{id}"), payload).await
    }

    pub async fn delete_tag(&self, id: u64) -> Result<Value> {
        self.delete(&format!("/api/v1/tags/{id}")).await
    }

    // --- Diving organizations ---

    pub async fn diving_organizations(&self) -> Result<Value> {
        self.get("/api/v1/diving-organizations/").await
    }

    pub async fn create_diving_organization(&self, payload: Value) -> Result<Value> {
        self.post("/api/v1/diving-organizations/", payload).await
    }

    pub async fn delete_diving_organization(&self, id: u64) -> Result<Value> {
        self.delete(&format!("/api/v1/diving-organizations/{id}"))
            .await
    }

    // --- Newsletters ---

    pub async fn newsletters(&self) -> Result<Value> {
        self.get("/api/v1/newsletters/").await
    }

    pub async fn create_newsletter(&self, payload: Value) -> Result<Value> {
        self.post("/api/v1/newsletters/", payload).await
    }

    pub async fn delete_newsletter(&self, id: u64) -> Result<Value> {
        self.delete(&format!("/api/v1/newsletters/{id}")).await
    }

    // --- Trips ---

    pub async fn trips(&self, query: &[(&str, &str)]) -> Result<Value> {
        self.get_with_query("/api/v1/trips/", query).await
    }

    pub async fn trip(&self, id: u64) -> Result<Value> {
        self.get(&format!("/api/v1/trips/{id}")).await
    }

    pub async fn create_trip(&self, payload: Value) -> Result<Value> {
        self.post("/api/v1/trips/", payload).await
    }

    pub async fn update_trip(&self, id: u64, payload: Value) -> Result<Value> {
        self.put(&format!("/api/v1/trips/{id}"), payload).await
    }

    pub async fn delete_trip(&self, id: u64) -> Result<Value> {
        self.delete(&format!("/api/v1/trips/{id}")).await
    }

    /// Persist `access_token` and `user` from a login-family response.
    ///
    /// Persistence failures are logged, not surfaced — the login itself
    /// succeeded and the caller gets its response either way.
    async fn store_session_fields(&self, body: &Value) {
        if let Some(token) = body.get("access_token").and_then(Value::as_str) {
            if let Err(e) = self.session().set_access_token(token.to_string()).await {
                warn!(error = %e, "failed to persist access token after login");
            }
        }
        if let Some(user) = body.get("user") {
            if let Err(e) = self.session().set_user(user.clone()).await {
                warn!(error = %e, "failed to cache user profile after login");
            }
        }
    }
}
