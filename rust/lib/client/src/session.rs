//! Session manager.
//!
//! Owns the signed-in identity, persists it to durable storage, and
//! re-validates a persisted session on load. No method here returns an
//! error: failures are logged and folded into the session state.

use std::sync::{Arc, RwLock};

use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::http::ProxyClient;
use crate::storage::{keys, KeyValueStore};

// ── TokenSource ─────────────────────────────────────────────────────

/// Provides the session id attached to every data request.
///
/// Returns `Ok(None)` when no session is held.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, ApiError>;
}

/// Fixed session id obtained elsewhere.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(Some(self.0.clone()))
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Snapshot of the authenticated identity.
///
/// `is_authenticated` implies a non-empty `session_token`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    pub session_token: String,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl Session {
    fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }
}

// ── SessionManager ──────────────────────────────────────────────────

pub struct SessionManager {
    client: ProxyClient,
    store: Arc<dyn KeyValueStore>,
    state: RwLock<Session>,
}

impl SessionManager {
    /// New manager in the loading state. Call [`load`](Self::load) next.
    pub fn new(client: ProxyClient, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            client,
            store,
            state: RwLock::new(Session::loading()),
        }
    }

    /// Current session snapshot.
    pub fn session(&self) -> Session {
        self.state.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated
    }

    /// Session id, if signed in.
    pub fn session_id(&self) -> Option<String> {
        let s = self.session();
        s.is_authenticated.then_some(s.session_token)
    }

    fn update(&self, f: impl FnOnce(&mut Session)) {
        match self.state.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Restore a persisted session, then validate it against the backend.
    ///
    /// With nothing persisted this makes no request: the session ends up
    /// unauthenticated and not loading.
    pub async fn load(&self) {
        let token = self.store.get(keys::SESSION_ID).filter(|t| !t.is_empty());
        let Some(token) = token else {
            debug!("no persisted session");
            self.update(|s| {
                *s = Session::default();
            });
            return;
        };

        let user_id = self.store.get(keys::UID).unwrap_or_default();
        let display_name = self.store.get(keys::NAME).unwrap_or_default();
        self.update(|s| {
            s.user_id = user_id;
            s.display_name = display_name;
            s.session_token = token.clone();
            s.is_authenticated = true;
            s.is_loading = true;
        });

        self.validate_session(&token).await;
    }

    /// Sign in with the proxy. Returns true on success.
    ///
    /// On any failure the session is left unauthenticated with nothing
    /// persisted.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> bool {
        self.update(|s| s.is_loading = true);

        let resp = match self.client.sign_in(identifier, secret).await {
            Ok(resp) => resp,
            Err(e) => {
                error!("sign-in request failed: {e}");
                self.clear_identity();
                return false;
            }
        };

        let token = resp.session_id.clone().unwrap_or_default();
        if !resp.is_authenticated || token.is_empty() {
            warn!("sign-in rejected for {identifier}");
            self.clear_identity();
            return false;
        }

        let user_id = resp.uid_string().unwrap_or_default();
        let display_name = resp.name.clone().unwrap_or_default();

        if let Err(e) = self.persist(&token, &user_id, &display_name, identifier) {
            error!("failed to persist session: {e}");
            self.clear_identity();
            return false;
        }

        self.update(|s| {
            s.user_id = user_id;
            s.display_name = display_name;
            s.session_token = token;
            s.is_authenticated = true;
            s.is_loading = false;
        });
        info!("signed in as {identifier}");
        true
    }

    /// Re-check `token` with the backend.
    ///
    /// - valid: only clears the loading flag
    /// - invalid (or HTTP 401/403): signs out
    /// - transport or other failure: session kept as is, loading cleared
    ///
    /// The result is dropped if `token` is no longer the held session
    /// (a sign-in or sign-out happened while the check was pending).
    pub async fn validate_session(&self, token: &str) {
        let result = self.client.check_session(token).await;
        if self.session().session_token != token {
            debug!("session changed during validation, ignoring result");
            return;
        }
        match result {
            Ok(check) if check.is_valid => {
                debug!("session still valid");
                self.update(|s| s.is_loading = false);
            }
            Ok(_) => {
                info!("session reported invalid, signing out");
                self.sign_out();
            }
            Err(ApiError::Server { status: 401 | 403, .. }) => {
                info!("session rejected by proxy, signing out");
                self.sign_out();
            }
            Err(e) => {
                warn!("session validation failed, keeping session: {e}");
                self.update(|s| s.is_loading = false);
            }
        }
    }

    /// Forget the identity in memory and in storage. Idempotent.
    pub fn sign_out(&self) {
        self.clear_identity();
        debug!("signed out");
    }

    fn clear_identity(&self) {
        self.update(|s| {
            *s = Session::default();
        });
        for key in keys::IDENTITY {
            if let Err(e) = self.store.remove(key) {
                error!("failed to remove {key} from storage: {e}");
            }
        }
    }

    fn persist(
        &self,
        token: &str,
        user_id: &str,
        display_name: &str,
        login: &str,
    ) -> Result<(), crate::error::StorageError> {
        self.store.set(keys::SESSION_ID, token)?;
        self.store.set(keys::UID, user_id)?;
        self.store.set(keys::NAME, display_name)?;
        self.store.set(keys::LOGIN, login)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenSource for SessionManager {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(self.session_id())
    }
}
