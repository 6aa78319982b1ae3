//! Resilient HTTP client for the Divemap REST API
//!
//! Issues requests to the backend, transparently attaches credentials, and
//! recovers from expired sessions and transient failures without duplicating
//! requests or corrupting concurrent callers' state.
//!
//! Request lifecycle:
//! 1. The dispatcher reads the access token from the [`SessionStore`] and
//!    attaches `Authorization: Bearer <token>` when one is present
//! 2. On 401 (outside the login-family endpoints) a single-flight refresh
//!    cycle runs — one refresh call per burst of concurrently-failing
//!    requests — and the original request is replayed once with the new token
//! 3. On 5xx or a transport error the request is retried up to 3 times with
//!    exponential backoff (1s, 2s, 4s, capped at 10s)
//! 4. On 429 the rejection is annotated with the backend's retry-after value
//!    and returned unretried
//! 5. Every other failure passes through to the caller unmodified
//!
//! External listeners subscribe to [`ClientEvent`]s through
//! [`ApiClient::events`] instead of ambient globals: token refreshes,
//! backend-online liveness, and session expiry.

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod events;
mod metrics;
mod rate_limit;
mod retry;
mod singleflight;

pub use client::{ApiClient, ApiRequest, ApiResponse, MultipartField};
pub use config::{ClientOptions, is_local_hostname, resolve_api_base};
pub use error::{ApiError, Result};
pub use events::{ClientEvent, EventBus};

pub use divemap_auth::{Session, SessionStore};
