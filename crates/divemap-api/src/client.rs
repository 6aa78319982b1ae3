//! Request dispatcher
//!
//! Wraps every outgoing HTTP call so callers never construct headers or base
//! URLs themselves. The dispatch loop owns the three recovery paths:
//!
//! - 401 → single-flight refresh cycle, then one transparent replay
//! - 5xx / transport error → bounded exponential-backoff retry
//! - 429 → retry-after annotation, returned unretried
//!
//! Everything else is passed through to the caller unmodified. Requests are
//! rebuilt from an owned [`ApiRequest`] on each attempt, so replays are exact.

use std::fmt;
use std::sync::Arc;

use divemap_auth::SessionStore;
use divemap_auth::constants::is_auth_endpoint;
use reqwest::{Method, StatusCode, header};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::{API_URL_ENV, ClientOptions, resolve_api_base};
use crate::error::{ApiError, Result};
use crate::events::{ClientEvent, EventBus};
use crate::metrics;
use crate::rate_limit::retry_after_from;
use crate::retry::{RetryTracker, backoff_delay, is_retryable_status};
use crate::singleflight::SingleFlight;

/// One field of a multipart upload, held as owned data so the request can be
/// rebuilt for replay.
#[derive(Debug, Clone)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    None,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

/// An outgoing request: method, path relative to the API base, query pairs,
/// and an optional body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::None,
        }
    }

    /// Append a query pair.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Attach a multipart body (file uploads).
    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    /// Retry-tracking identity: method plus path plus query, so calls that
    /// differ only in parameters do not share an attempt count.
    pub(crate) fn identity(&self) -> String {
        let mut identity = format!("{}:{}", self.method, self.path);
        if !self.query.is_empty() {
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            identity.push('?');
            identity.push_str(&pairs.join("&"));
        }
        identity
    }
}

/// A settled 2xx response with its decoded JSON body.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    body: Value,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn json(&self) -> &Value {
        &self.body
    }

    pub fn into_json(self) -> Value {
        self.body
    }
}

enum SendFailure {
    /// Request never produced a response; eligible for the transient policy.
    Transport(reqwest::Error),
    /// Request could not be constructed; terminal.
    Build(ApiError),
}

/// Resilient HTTP client for the Divemap REST API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    options: ClientOptions,
    refresh_gate: SingleFlight<divemap_auth::Result<String>>,
    retries: RetryTracker,
    events: EventBus,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .finish()
    }
}

impl ApiClient {
    /// Create a client talking to an explicit API base URL.
    ///
    /// The underlying HTTP client carries a cookie store (the refresh token
    /// rides an HTTP-only cookie) and defaults to a JSON content type.
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Transport(format!("building HTTP client: {e}")))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url, "api client initialized");

        Ok(Self {
            http,
            base_url,
            session,
            options: ClientOptions::default(),
            refresh_gate: SingleFlight::new(),
            retries: RetryTracker::new(),
            events: EventBus::default(),
        })
    }

    /// Create a client for an application served from `origin`, applying the
    /// local-development base-URL rules (see [`resolve_api_base`]).
    pub fn from_origin(origin: &str, session: Arc<SessionStore>) -> Result<Self> {
        let env_override = std::env::var(API_URL_ENV).ok();
        let base_url = resolve_api_base(origin, env_override.as_deref());
        Self::new(base_url, session)
    }

    /// Replace the default tuning knobs.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// The resolved API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Event bus for refresh/liveness notifications.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The session store backing this client.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Dispatch a request through the full recovery pipeline.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        self.dispatch(request, request_id).await
    }

    /// Convenience: GET returning the decoded JSON body.
    pub async fn get(&self, path: &str) -> Result<Value> {
        Ok(self
            .execute(ApiRequest::new(Method::GET, path))
            .await?
            .into_json())
    }

    /// Convenience: GET with query pairs.
    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let mut request = ApiRequest::new(Method::GET, path);
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        Ok(self.execute(request).await?.into_json())
    }

    /// Convenience: POST with a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        Ok(self
            .execute(ApiRequest::new(Method::POST, path).json(body))
            .await?
            .into_json())
    }

    /// Convenience: PUT with a JSON body.
    pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
        Ok(self
            .execute(ApiRequest::new(Method::PUT, path).json(body))
            .await?
            .into_json())
    }

    /// Convenience: DELETE.
    pub async fn delete(&self, path: &str) -> Result<Value> {
        Ok(self
            .execute(ApiRequest::new(Method::DELETE, path))
            .await?
            .into_json())
    }

    #[instrument(
        skip_all,
        fields(request_id = %request_id, method = %request.method, path = %request.path)
    )]
    async fn dispatch(&self, request: ApiRequest, request_id: String) -> Result<ApiResponse> {
        let identity = request.identity();
        let url = format!("{}{}", self.base_url, request.path);
        // Once a request has been replayed after a refresh, a second 401
        // falls through to the caller instead of looping.
        let mut auth_replayed = false;
        // Token minted by a refresh cycle, preferred over the stored one for
        // the replay.
        let mut token_override: Option<String> = None;

        loop {
            let token = match token_override.clone() {
                Some(token) => Some(token),
                None => self.session.access_token().await,
            };

            match self.send_once(&request, token.as_deref()).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        self.retries.clear(&identity).await;
                        metrics::record_request(status.as_u16(), request.method.as_str());
                        self.events.emit(ClientEvent::BackendOnline { url: url.clone() });
                        return read_json(response, status).await;
                    }

                    if status == StatusCode::UNAUTHORIZED
                        && !auth_replayed
                        && !is_auth_endpoint(&request.path)
                    {
                        auth_replayed = true;
                        debug!("access token rejected, entering refresh cycle");
                        match self.refresh_access_token().await {
                            Ok(new_token) => {
                                token_override = Some(new_token);
                                continue;
                            }
                            Err(e) => {
                                self.retries.clear(&identity).await;
                                return Err(ApiError::SessionExpired {
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        self.retries.clear(&identity).await;
                        metrics::record_rate_limited();
                        metrics::record_request(429, request.method.as_str());
                        let retry_after = annotate_rate_limit(response).await;
                        warn!(retry_after, "rate limited by backend");
                        return Err(ApiError::RateLimited { retry_after });
                    }

                    if is_retryable_status(status.as_u16()) {
                        if let Some(terminal) = self
                            .note_transient_failure(&identity, Some(status.as_u16()))
                            .await
                        {
                            metrics::record_request(status.as_u16(), request.method.as_str());
                            return Err(terminal);
                        }
                        continue;
                    }

                    // All other failures pass through unmodified
                    self.retries.clear(&identity).await;
                    metrics::record_request(status.as_u16(), request.method.as_str());
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| String::from("<no body>"));
                    return Err(ApiError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(SendFailure::Build(err)) => return Err(err),
                Err(SendFailure::Transport(err)) => {
                    debug!(error = %err, "request produced no response");
                    if let Some(terminal) = self.note_transient_failure(&identity, None).await {
                        return Err(terminal);
                    }
                    continue;
                }
            }
        }
    }

    /// Run one refresh cycle through the single-flight gate.
    ///
    /// However many requests fail with 401 concurrently, only the leader
    /// calls the refresh endpoint; every waiter shares its outcome. All side
    /// effects (persist, clear, events) happen exactly once per cycle, on
    /// the leader.
    async fn refresh_access_token(&self) -> divemap_auth::Result<String> {
        self.refresh_gate.run(|| self.run_refresh_cycle()).await
    }

    async fn run_refresh_cycle(&self) -> divemap_auth::Result<String> {
        match divemap_auth::refresh_session(&self.http, &self.base_url).await {
            Ok(refreshed) => {
                if let Err(e) = self
                    .session
                    .set_access_token(refreshed.access_token.clone())
                    .await
                {
                    warn!(error = %e, "failed to persist refreshed token");
                }
                metrics::record_refresh("success");
                info!("session refresh succeeded");
                self.events.emit(ClientEvent::TokenRefreshed {
                    access_token: refreshed.access_token.clone(),
                });
                Ok(refreshed.access_token)
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed, clearing credentials");
                metrics::record_refresh("failure");
                if let Err(clear_err) = self.session.clear().await {
                    warn!(error = %clear_err, "failed to clear session after refresh failure");
                }
                self.events.emit(ClientEvent::SessionExpired);
                Err(e)
            }
        }
    }

    /// Consult the retry policy after a retryable failure.
    ///
    /// Under the ceiling: record the attempt, sleep the backoff, return
    /// `None` so the dispatch loop replays. At the ceiling: clear the
    /// counter and return the terminal gateway error.
    async fn note_transient_failure(
        &self,
        identity: &str,
        status: Option<u16>,
    ) -> Option<ApiError> {
        let attempts = self.retries.attempts(identity).await;
        if attempts >= self.options.retry_max_attempts {
            self.retries.clear(identity).await;
            warn!(
                identity,
                attempts = attempts + 1,
                ?status,
                "transient retries exhausted"
            );
            return Some(ApiError::Gateway {
                status,
                attempts: attempts + 1,
            });
        }

        let recorded = self.retries.record(identity).await;
        let delay = backoff_delay(
            attempts,
            self.options.retry_base_delay,
            self.options.retry_max_delay,
        );
        metrics::record_transient_retry(status);
        warn!(
            identity,
            attempt = recorded,
            delay_ms = delay.as_millis() as u64,
            ?status,
            "transient failure, retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        None
    }

    async fn send_once(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> std::result::Result<reqwest::Response, SendFailure> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            RequestBody::None => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(fields) => {
                builder.multipart(build_form(fields).map_err(SendFailure::Build)?)
            }
        };
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder.send().await.map_err(SendFailure::Transport)
    }

    /// Direct access for the health-check helper, which bypasses the
    /// dispatch pipeline entirely.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn options(&self) -> &ClientOptions {
        &self.options
    }
}

/// Rebuild a multipart form from owned field data.
fn build_form(fields: &[MultipartField]) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        form = match field {
            MultipartField::Text { name, value } => form.text(name.clone(), value.clone()),
            MultipartField::File {
                name,
                file_name,
                mime,
                data,
            } => {
                let part = reqwest::multipart::Part::bytes(data.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)
                    .map_err(|e| ApiError::Transport(format!("invalid upload MIME type: {e}")))?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

async fn read_json(response: reqwest::Response, status: StatusCode) -> Result<ApiResponse> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Transport(format!("reading response body: {e}")))?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::Decode(format!("invalid JSON response: {e}")))?
    };
    Ok(ApiResponse { status, body })
}

/// Extract the retry-after annotation from a 429 response.
async fn annotate_rate_limit(response: reqwest::Response) -> u64 {
    let header = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body = response
        .text()
        .await
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or(Value::Null);
    retry_after_from(header.as_deref(), &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_includes_method_and_path() {
        let request = ApiRequest::new(Method::GET, "/api/v1/dive-sites/");
        assert_eq!(request.identity(), "GET:/api/v1/dive-sites/");
    }

    #[test]
    fn identity_includes_query_pairs() {
        let request = ApiRequest::new(Method::GET, "/api/v1/search/")
            .query("q", "wreck")
            .query("limit", "20");
        assert_eq!(request.identity(), "GET:/api/v1/search/?q=wreck&limit=20");
    }

    #[test]
    fn identity_distinguishes_methods() {
        let get = ApiRequest::new(Method::GET, "/api/v1/tags/");
        let post = ApiRequest::new(Method::POST, "/api/v1/tags/");
        assert_ne!(get.identity(), post.identity());
    }

    #[test]
    fn json_builder_sets_body() {
        let request =
            ApiRequest::new(Method::POST, "/api/v1/tags/").json(serde_json::json!({"name": "cave"}));
        assert!(matches!(request.body, RequestBody::Json(_)));
    }

    #[tokio::test]
    async fn debug_output_has_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            SessionStore::load(dir.path().join("session.json"))
                .await
                .unwrap(),
        );
        store.set_access_token("at_secret".into()).await.unwrap();

        let client = ApiClient::new("http://localhost:8000", store).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("at_secret"));
        assert!(debug.contains("http://localhost:8000"));
    }
}
