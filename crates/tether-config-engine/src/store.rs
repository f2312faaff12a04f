//! In-memory session store and lifecycle manager.
//!
//! The store is the only shared mutable resource in the engine: a concurrent
//! map from session id to session, handed out behind a per-session mutex so
//! concurrent `execute_step` calls against the same session serialize
//! instead of racing on the step pointer.
//!
//! Expiry is two-tiered. Reads stamp an over-idle session `Expired` in place
//! without removing it; only [`SessionStore::cleanup_expired`] — invoked
//! periodically by an external caller, this component has no timer — frees
//! the memory.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::session::{ConfigSession, SessionStatus};

/// Shared handle to one stored session.
pub type SessionHandle = Arc<Mutex<ConfigSession>>;

/// Concurrent in-memory store for configuration sessions.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionStore {
    /// Create an empty store. Expiration is handled lazily on access plus
    /// the explicit cleanup sweep.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a fresh session, returning a snapshot of it.
    pub fn create(&self, adapter_type: &str, user_id: &str) -> ConfigSession {
        let session = ConfigSession::new(adapter_type, user_id);
        debug!(
            session_id = %session.session_id,
            adapter_type = %session.adapter_type,
            "configuration session created"
        );
        self.sessions.insert(
            session.session_id.clone(),
            Arc::new(Mutex::new(session.clone())),
        );
        session
    }

    /// Fetch a session handle by id.
    ///
    /// A session found idle past the timeout is stamped [`SessionStatus::Expired`]
    /// as a side effect of the read itself. It stays in the store — only the
    /// cleanup sweep removes entries.
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        let handle = self
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))?;
        {
            let mut session = handle.lock().await;
            if session.status != SessionStatus::Expired && session.idle_expired(Utc::now()) {
                session.status = SessionStatus::Expired;
                debug!(session_id = %session.session_id, "session expired on read");
            }
        }
        Some(handle)
    }

    /// Remove every session idle past the timeout and return how many were
    /// dropped. This is the only path that actually frees session memory.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        // Snapshot the handles first so no shard lock is held across awaits.
        let handles: Vec<(String, SessionHandle)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut removed = 0;
        for (session_id, handle) in handles {
            let expired = handle.lock().await.idle_expired(now);
            if expired && self.sessions.remove(&session_id).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "expired sessions swept");
        }
        removed
    }

    /// Number of sessions currently held (including expired-but-unswept).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SESSION_IDLE_TIMEOUT_SECS;
    use chrono::Duration;

    /// Backdate a stored session so it reads as idle past the timeout.
    async fn backdate(handle: &SessionHandle, extra_secs: i64) {
        let mut session = handle.lock().await;
        session.updated_at =
            Utc::now() - Duration::seconds(SESSION_IDLE_TIMEOUT_SECS + extra_secs);
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let store = SessionStore::new();
        let created = store.create("slack", "user-1");

        let handle = store.get(&created.session_id).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.session_id, created.session_id);
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let store = SessionStore::new();
        assert!(store.get("no-such-session").await.is_none());
    }

    #[tokio::test]
    async fn expiry_is_lazy_and_non_destructive_on_read() {
        let store = SessionStore::new();
        let created = store.create("slack", "user-1");

        let handle = store.get(&created.session_id).await.unwrap();
        backdate(&handle, 60).await;

        // The read stamps the status but does not remove the entry.
        let handle = store.get(&created.session_id).await.unwrap();
        assert_eq!(handle.lock().await.status, SessionStatus::Expired);
        assert_eq!(store.len(), 1);

        // Still retrievable by the same id.
        assert!(store.get(&created.session_id).await.is_some());
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_sessions() {
        let store = SessionStore::new();
        let stale = store.create("slack", "user-1");
        let fresh = store.create("slack", "user-2");

        let handle = store.get(&stale.session_id).await.unwrap();
        backdate(&handle, 60).await;

        let removed = store.cleanup_expired().await;
        assert_eq!(removed, 1);
        assert!(store.get(&stale.session_id).await.is_none());
        assert!(store.get(&fresh.session_id).await.is_some());
    }

    #[tokio::test]
    async fn cleanup_on_empty_store_is_zero() {
        let store = SessionStore::new();
        assert_eq!(store.cleanup_expired().await, 0);
        assert!(store.is_empty());
    }
}
