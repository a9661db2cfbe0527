//! Session store: the process-wide map from session id to session record.
//!
//! Grounded on `rag_engine.py`'s in-memory `self.chat_sessions` dict plus
//! its periodic eviction, and on the teacher's fondness for `RwLock`-guarded
//! maps for shared process state. Per-session turns are serialized with a
//! `tokio::sync::Mutex` keyed by session id (§5): a turn holds the lock for
//! its full duration, but other sessions proceed freely.

use crate::core::Session;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

struct Entry {
    session: Arc<Mutex<Session>>,
}

/// In-memory map of session id to session record. All operations are
/// O(1) except the eviction sweep.
#[derive(Default)]
pub struct SessionStore {
    sessions: std::sync::RwLock<HashMap<String, Entry>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `id`, creating it if absent. Opportunistically
    /// sweeps sessions idle beyond `ttl` first.
    pub fn get_or_create(&self, id: &str, ttl: Duration) -> Arc<Mutex<Session>> {
        self.sweep(ttl);
        {
            let guard = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = guard.get(id) {
                return Arc::clone(&entry.session);
            }
        }
        let mut guard = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        // Re-check under the write lock in case of a racing create.
        if let Some(entry) = guard.get(id) {
            return Arc::clone(&entry.session);
        }
        let session = Arc::new(Mutex::new(Session::new(id)));
        guard.insert(
            id.to_string(),
            Entry {
                session: Arc::clone(&session),
            },
        );
        session
    }

    /// Returns the session for `id` if it exists, without creating one.
    #[must_use]
    pub fn fetch(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        let guard = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        guard.get(id).map(|entry| Arc::clone(&entry.session))
    }

    /// Explicitly allocates a new session, returning its id. If `id` already
    /// exists it is replaced with a fresh session.
    pub fn allocate(&self, id: impl Into<String>) -> Arc<Mutex<Session>> {
        let id = id.into();
        let session = Arc::new(Mutex::new(Session::new(&id)));
        let mut guard = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(
            id,
            Entry {
                session: Arc::clone(&session),
            },
        );
        session
    }

    /// Removes a session, if present.
    pub fn remove(&self, id: &str) {
        let mut guard = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(id);
    }

    /// Evicts every session idle beyond `ttl`. Need not be exact; invoked
    /// opportunistically on `get_or_create`.
    pub fn sweep(&self, ttl: Duration) {
        let mut guard = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        // A session currently locked (mid-turn) is never evicted, regardless
        // of its last-accessed time: its turn is still in flight.
        guard.retain(|_, entry| match entry.session.try_lock() {
            Ok(s) => !s.is_expired(ttl),
            Err(_) => true,
        });
        let evicted = before - guard.len();
        if evicted > 0 {
            info!(evicted, "session store sweep evicted idle sessions");
        }
    }

    /// Number of sessions currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// `true` if no sessions are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_returns_same_session_for_same_id() {
        let store = SessionStore::new();
        let a = store.get_or_create("s1", Duration::from_secs(3600));
        let b = store.get_or_create("s1", Duration::from_secs(3600));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn fetch_returns_none_for_unknown_session() {
        let store = SessionStore::new();
        assert!(store.fetch("missing").is_none());
    }

    #[tokio::test]
    async fn allocate_replaces_existing_session() {
        let store = SessionStore::new();
        let a = store.get_or_create("s1", Duration::from_secs(3600));
        {
            let mut guard = a.lock().await;
            guard.record_turn("q", "a", 5);
        }
        let b = store.allocate("s1");
        let guard = b.lock().await;
        assert!(guard.history.is_empty());
    }

    #[tokio::test]
    async fn remove_drops_session() {
        let store = SessionStore::new();
        store.get_or_create("s1", Duration::from_secs(3600));
        store.remove("s1");
        assert!(store.fetch("s1").is_none());
    }

    #[tokio::test]
    async fn sweep_evicts_idle_sessions() {
        let store = SessionStore::new();
        let session = store.get_or_create("s1", Duration::from_secs(3600));
        {
            let mut guard = session.lock().await;
            guard.last_accessed = std::time::Instant::now() - Duration::from_secs(10);
        }
        store.sweep(Duration::from_secs(1));
        assert!(store.is_empty());
    }
}
