//! Divemap session authentication library
//!
//! Provides persisted session storage and the token-refresh endpoint call
//! for the Divemap API client. This crate is a standalone library with no
//! dependency on the dispatcher — it can be tested and used independently.
//!
//! Session flow:
//! 1. Application logs in via the API client; the backend sets an HTTP-only
//!    refresh cookie and returns an access token
//! 2. Access token stored via `SessionStore::set_access_token()`
//! 3. Dispatcher reads the token via `SessionStore::access_token()` before
//!    each request
//! 4. On 401, the dispatcher calls `refresh_session()` (cookie supplies the
//!    refresh token) and stores the new access token
//! 5. If refresh fails, `SessionStore::clear()` wipes all credentials

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{Session, SessionStore};
pub use error::{Error, Result};
pub use token::{RefreshResponse, refresh_session};
