use std::sync::Arc;

use crate::store::{PersistedSession, SessionStore};

/// Fixed session lifetime: three days in milliseconds.
pub const SESSION_TTL_MS: u64 = 3 * 24 * 60 * 60 * 1000;

/// The authenticated-user context while logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub established_at_ms: u64,
}

impl Session {
    /// Returns true once more than the fixed window has elapsed.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.established_at_ms) > SESSION_TTL_MS
    }
}

/// Owns the logged-in/logged-out state and its durable mirror.
///
/// The model is single-writer, last-login-wins: establishing a session
/// overwrites whatever the store held before.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    current: Option<Session>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.current.as_ref().map(|session| session.user_id.as_str())
    }

    pub fn is_logged_in(&self) -> bool {
        self.current.is_some()
    }

    /// Startup path: restores a stored session if it is still inside the
    /// expiry window; anything stale or unreadable is cleared and the
    /// manager stays logged out.
    pub fn restore(&mut self, now_ms: u64) -> Option<&Session> {
        let persisted = match self.store.load() {
            Ok(persisted) => persisted,
            Err(error) => {
                tracing::warn!(%error, "failed to read persisted session; clearing");
                self.clear_durable();
                return None;
            }
        };

        let Some(persisted) = persisted else {
            return None;
        };

        let candidate = Session {
            user_id: persisted.user_id,
            established_at_ms: persisted.established_at_ms,
        };

        if candidate.is_expired(now_ms) {
            tracing::info!(
                user_id = %candidate.user_id,
                "persisted session expired; clearing"
            );
            self.clear_durable();
            return None;
        }

        tracing::info!(user_id = %candidate.user_id, "restored persisted session");
        self.current = Some(candidate);
        self.current.as_ref()
    }

    /// Establishes a session after successful login or signup and persists
    /// both durable keys.
    ///
    /// The server already accepted the credentials, so a failed durable
    /// write downgrades to a warning: the session holds for this run and
    /// simply will not survive a reload.
    pub fn establish(&mut self, user_id: impl Into<String>, now_ms: u64) -> &Session {
        let session = Session {
            user_id: user_id.into(),
            established_at_ms: now_ms,
        };

        if let Err(error) = self.store.save(&PersistedSession {
            user_id: session.user_id.clone(),
            established_at_ms: session.established_at_ms,
        }) {
            tracing::warn!(%error, "failed to persist session keys");
        }

        self.current = Some(session);
        self.current.as_ref().expect("session set above")
    }

    /// Logs out: clears durable storage and the in-memory session.
    pub fn logout(&mut self) {
        self.current = None;
        self.clear_durable();
    }

    fn clear_durable(&self) {
        if let Err(error) = self.store.clear() {
            tracing::warn!(%error, "failed to clear persisted session");
        }
    }
}
