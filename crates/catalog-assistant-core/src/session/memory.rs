//! In-memory [`SessionStore`] implementation.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. State is lost on restart,
//! which is acceptable for pending contact requests.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{SessionState, SessionStore};

/// In-memory session store.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("session store lock poisoned")
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionState>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(session_id).cloned())
    }

    async fn put(&self, session_id: &str, state: SessionState) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session_id.to_string(), state);
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.remove(session_id);
        Ok(())
    }

    async fn remove_stale(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_stale(cutoff));
        Ok(before - sessions.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.sessions.read().map_err(poisoned)?.len())
    }
}
