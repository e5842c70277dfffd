//! Session state tracking with per-session serialization.
//!
//! Wraps a [`SessionStore`] with:
//!
//! - a per-session async mutex, held by the orchestrator for a whole turn so
//!   two turns of the same conversation never interleave their
//!   read-modify-write of the session state;
//! - expiry of pending contact requests after `sessions.pending_ttl_secs`.
//!   An expired session reads as normal and is purged by [`SessionTracker::purge_expired`].

use anyhow::Result;
use catalog_assistant_core::session::{SessionState, SessionStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

pub struct SessionTracker {
    store: Arc<dyn SessionStore>,
    ttl: chrono::Duration,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(3650)),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Exclusive access to one session until the guard is dropped.
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }

    /// The live pending state of a session, if any. Expired entries are
    /// removed and read as `None`.
    pub async fn pending(&self, session_id: &str) -> Result<Option<SessionState>> {
        let Some(state) = self.store.get(session_id).await? else {
            return Ok(None);
        };
        if !state.is_awaiting_contact() {
            return Ok(None);
        }
        if state.is_stale(Utc::now() - self.ttl) {
            tracing::debug!(session = session_id, "pending session expired");
            self.store.remove(session_id).await?;
            return Ok(None);
        }
        Ok(Some(state))
    }

    /// Record an unmatched product query. Replaces any earlier one.
    pub async fn mark_awaiting_contact(&self, session_id: &str, query: &str) -> Result<()> {
        self.store
            .put(session_id, SessionState::awaiting_contact(query, Utc::now()))
            .await
    }

    /// Forget a session after its lead has been captured.
    pub async fn clear(&self, session_id: &str) -> Result<()> {
        self.store.remove(session_id).await
    }

    /// Remove expired pending sessions and idle locks.
    pub async fn purge_expired(&self) -> Result<usize> {
        let removed = self.store.remove_stale(Utc::now() - self.ttl).await?;

        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.retain(|_, m| Arc::strong_count(m) > 1);

        Ok(removed)
    }

    pub async fn active_sessions(&self) -> Result<usize> {
        self.store.len().await
    }

    /// Run [`purge_expired`](Self::purge_expired) every `interval`.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(removed = n, "expired sessions purged"),
                    Err(e) => tracing::warn!(error = %e, "session sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_assistant_core::session::memory::InMemorySessionStore;

    fn tracker(ttl: Duration) -> (Arc<InMemorySessionStore>, SessionTracker) {
        let store = Arc::new(InMemorySessionStore::new());
        (store.clone(), SessionTracker::new(store, ttl))
    }

    #[tokio::test]
    async fn test_mark_overwrites_and_clear_removes() {
        let (_, tracker) = tracker(Duration::from_secs(1800));
        tracker.mark_awaiting_contact("s1", "first").await.unwrap();
        tracker.mark_awaiting_contact("s1", "second").await.unwrap();
        let state = tracker.pending("s1").await.unwrap().unwrap();
        assert_eq!(state.pending_product_query.as_deref(), Some("second"));

        tracker.clear("s1").await.unwrap();
        assert!(tracker.pending("s1").await.unwrap().is_none());
        assert!(tracker.pending("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_pending_reads_as_normal() {
        let (store, tracker) = tracker(Duration::from_secs(60));
        store
            .put(
                "old",
                SessionState::awaiting_contact("q", Utc::now() - chrono::Duration::minutes(5)),
            )
            .await
            .unwrap();
        tracker.mark_awaiting_contact("fresh", "q").await.unwrap();

        assert!(tracker.pending("old").await.unwrap().is_none());
        assert!(store.get("old").await.unwrap().is_none());
        assert!(tracker.pending("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, tracker) = tracker(Duration::from_secs(60));
        store
            .put(
                "old",
                SessionState::awaiting_contact("q", Utc::now() - chrono::Duration::minutes(5)),
            )
            .await
            .unwrap();
        tracker.mark_awaiting_contact("fresh", "q").await.unwrap();
        drop(tracker.lock("old").await);

        assert_eq!(tracker.purge_expired().await.unwrap(), 1);
        assert_eq!(tracker.active_sessions().await.unwrap(), 1);
        assert!(tracker.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_serializes_same_session() {
        let (_, tracker) = tracker(Duration::from_secs(60));
        let tracker = Arc::new(tracker);

        let guard = tracker.lock("s1").await;
        let t = tracker.clone();
        let waiter = tokio::spawn(async move {
            let _g = t.lock("s1").await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        // A different session is not blocked.
        drop(tracker.lock("s2").await);

        drop(guard);
        waiter.await.unwrap();
    }
}
