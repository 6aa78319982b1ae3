//! Persisted session storage
//!
//! Manages a JSON file holding the current session's credentials: the access
//! token, an optional legacy refresh token, and the cached user profile. All
//! writes use atomic temp-file + rename to prevent corruption on crash. A
//! tokio Mutex serializes concurrent writes from login, request-time refresh,
//! and logout.
//!
//! The session file is the single source of truth for the access token. The
//! dispatcher reads it before every outgoing request; a missing token is not
//! an error — the request simply goes out unauthenticated.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The persisted session state.
///
/// `refresh_token` normally rides an HTTP-only cookie managed by the backend
/// and is never written here; the field exists so that logout can scrub a
/// value left behind by older clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// Current access token (Bearer token for API calls)
    pub access_token: Option<String>,
    /// Legacy refresh token slot, cleared on logout
    pub refresh_token: Option<String>,
    /// Cached user profile returned by the login endpoint
    pub user: Option<serde_json::Value>,
}

impl Session {
    /// Whether no credential or profile data is present.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

/// Thread-safe session file manager.
///
/// The Mutex serializes all writes. Reads acquire the lock briefly to clone
/// the in-memory state, so request-time reads don't block on writers.
pub struct SessionStore {
    path: PathBuf,
    state: Mutex<Session>,
}

impl SessionStore {
    /// Load the session from the given file path.
    ///
    /// If the file doesn't exist, creates it with an empty session (cold
    /// start, no one logged in). Requests proceed unauthenticated until a
    /// login or refresh stores a token.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let session: Session = serde_json::from_str(&contents)
                .map_err(|e| Error::SessionParse(format!("parsing session file: {e}")))?;
            info!(
                path = %path.display(),
                authenticated = session.access_token.is_some(),
                "loaded session"
            );
            session
        } else {
            info!(path = %path.display(), "session file not found, starting unauthenticated");
            let session = Session::default();
            // Create the empty file so future loads don't need the cold-start path
            write_atomic(&path, &session).await?;
            session
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Get a clone of the current access token, if any.
    pub async fn access_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.access_token.clone()
    }

    /// Get a clone of the cached user profile, if any.
    pub async fn user(&self) -> Option<serde_json::Value> {
        let state = self.state.lock().await;
        state.user.clone()
    }

    /// Store a new access token after login or a successful refresh.
    pub async fn set_access_token(&self, access_token: String) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access_token = Some(access_token);
        debug!("stored access token");
        write_atomic(&self.path, &state).await
    }

    /// Cache the user profile returned by the login endpoint.
    pub async fn set_user(&self, user: serde_json::Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.user = Some(user);
        debug!("stored user profile");
        write_atomic(&self.path, &state).await
    }

    /// Clear all persisted credentials and the cached user.
    ///
    /// Called on logout and when a refresh definitively fails — the
    /// application cannot continue with a dead session.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = Session::default();
        info!("cleared session");
        write_atomic(&self.path, &state).await
    }

    /// Whether any session data is currently stored.
    pub async fn is_empty(&self) -> bool {
        let state = self.state.lock().await;
        state.is_empty()
    }
}

/// Write the session to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains the bearer token.
async fn write_atomic(path: &Path, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session)
        .map_err(|e| Error::SessionParse(format!("serializing session: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
