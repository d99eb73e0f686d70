//! Token store for the client session
//!
//! Holds the credential bundle (access, refresh, CSRF and logout tokens) plus
//! the session flags and OAuth artifacts in a JSON file keyed exactly like the
//! browser storage the backend's web client uses. All writes use atomic
//! temp-file + rename to prevent corruption on crash. A tokio Mutex
//! serializes writes from the request interceptor and the Auth Service.
//!
//! The store is handed around as `Arc<TokenStore>`; there is no process-wide
//! instance.

use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Persisted session state.
///
/// Field names on disk match the storage keys `accessToken`, `refreshToken`,
/// `csrfToken`, `userData`, `isLoggedIn`, `oauth_state` and `oauth_code`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    /// Raw user data returned by session login (carries `logout_token`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_logged_in: bool,
    #[serde(
        rename = "oauth_state",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub oauth_state: Option<String>,
    #[serde(
        rename = "oauth_code",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub oauth_code: Option<String>,
}

impl StoredSession {
    fn logout_token(&self) -> Option<String> {
        self.user_data
            .as_ref()?
            .get("logout_token")?
            .as_str()
            .map(str::to_owned)
    }
}

/// Snapshot of the four token kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub csrf_token: Option<String>,
    pub logout_token: Option<String>,
}

/// Presence flags for the current session. Never carries token values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub is_logged_in: bool,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub has_csrf_token: bool,
    pub has_logout_token: bool,
}

/// Session token store, optionally backed by a file.
pub struct TokenStore {
    path: Option<PathBuf>,
    state: Mutex<StoredSession>,
    #[cfg(test)]
    writes_left: AtomicUsize,
}

impl TokenStore {
    /// Load the store from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (logged-out session).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let session: StoredSession = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;
            info!(
                path = %path.display(),
                logged_in = session.is_logged_in,
                "loaded session"
            );
            session
        } else {
            info!(path = %path.display(), "session file not found, starting logged out");
            let session = StoredSession::default();
            write_atomic(&path, &session).await?;
            session
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
            #[cfg(test)]
            writes_left: AtomicUsize::new(usize::MAX),
        })
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoredSession::default()),
            #[cfg(test)]
            writes_left: AtomicUsize::new(usize::MAX),
        }
    }

    /// Apply a mutation and persist the result.
    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut StoredSession),
    {
        let mut state = self.state.lock().await;
        mutate(&mut state);
        #[cfg(test)]
        self.spend_write()?;
        match &self.path {
            Some(path) => write_atomic(path, &state).await,
            None => Ok(()),
        }
    }

    /// Let the next `writes` persists succeed and fail every one after.
    #[cfg(test)]
    pub(crate) fn fail_writes_after(&self, writes: usize) {
        self.writes_left.store(writes, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn spend_write(&self) -> Result<()> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| Error::Io(String::from("session file is not writable")))
    }

    /// Clone of the full persisted state.
    pub async fn snapshot(&self) -> StoredSession {
        self.state.lock().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.lock().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state.lock().await.refresh_token.clone()
    }

    pub async fn csrf_token(&self) -> Option<String> {
        self.state.lock().await.csrf_token.clone()
    }

    /// Logout token embedded in the stored user data.
    pub async fn logout_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        let token = state.logout_token();
        if token.is_none() && state.user_data.is_some() {
            debug!("user data present but carries no logout_token");
        }
        token
    }

    pub async fn is_logged_in(&self) -> bool {
        self.state.lock().await.is_logged_in
    }

    pub async fn oauth_state(&self) -> Option<String> {
        self.state.lock().await.oauth_state.clone()
    }

    pub async fn oauth_code(&self) -> Option<String> {
        self.state.lock().await.oauth_code.clone()
    }

    /// All four token kinds at once.
    pub async fn bundle(&self) -> CredentialBundle {
        let state = self.state.lock().await;
        CredentialBundle {
            access_token: state.access_token.clone(),
            refresh_token: state.refresh_token.clone(),
            csrf_token: state.csrf_token.clone(),
            logout_token: state.logout_token(),
        }
    }

    pub async fn status(&self) -> AuthStatus {
        let state = self.state.lock().await;
        AuthStatus {
            is_logged_in: state.is_logged_in,
            has_access_token: state.access_token.is_some(),
            has_refresh_token: state.refresh_token.is_some(),
            has_csrf_token: state.csrf_token.is_some(),
            has_logout_token: state.logout_token().is_some(),
        }
    }

    /// Store an access token and, when non-empty, a refresh token.
    ///
    /// An absent or empty refresh token leaves the stored one untouched.
    pub async fn set_tokens(&self, access: &str, refresh: Option<&str>) -> Result<()> {
        let refresh = refresh.filter(|r| !r.is_empty()).map(str::to_owned);
        let access = access.to_owned();
        self.update(move |state| {
            state.access_token = Some(access);
            if refresh.is_some() {
                state.refresh_token = refresh;
            }
        })
        .await?;
        debug!("stored access token");
        Ok(())
    }

    pub async fn set_csrf_token(&self, token: &str) -> Result<()> {
        let token = token.to_owned();
        self.update(move |s| s.csrf_token = Some(token)).await
    }

    /// Record a successful session login.
    pub async fn set_session(&self, user_data: serde_json::Value) -> Result<()> {
        self.update(move |state| {
            state.user_data = Some(user_data);
            state.is_logged_in = true;
        })
        .await
    }

    pub async fn set_oauth_state(&self, value: &str) -> Result<()> {
        let value = value.to_owned();
        self.update(move |s| s.oauth_state = Some(value)).await
    }

    pub async fn remove_oauth_state(&self) -> Result<()> {
        self.update(|state| state.oauth_state = None).await
    }

    pub async fn set_oauth_code(&self, code: &str) -> Result<()> {
        let code = code.to_owned();
        self.update(move |s| s.oauth_code = Some(code)).await
    }

    /// Remove every token, the session flags and the OAuth artifacts in one write.
    pub async fn clear(&self) -> Result<()> {
        self.update(|s| *s = StoredSession::default()).await?;
        info!("cleared session tokens");
        Ok(())
    }

    /// Like `clear`, but a persistence failure is only logged.
    ///
    /// The in-memory state is always cleared, so the process never keeps
    /// using credentials the caller asked to drop.
    pub async fn clear_best_effort(&self) {
        if let Err(e) = self.clear().await {
            warn!(error = %e, "failed to persist cleared session");
        }
    }
}

/// Write the session to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains bearer tokens.
async fn write_atomic(path: &Path, data: &StoredSession) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

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
