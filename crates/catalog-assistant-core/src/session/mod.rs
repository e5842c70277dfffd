//! Conversation session state.
//!
//! A session is either `Normal` or `AwaitingContact`. Only sessions that are
//! awaiting contact details carry data, so stores only persist those; a
//! missing entry reads as `Normal`.
//!
//! ```text
//!              zero matches                      name + phone captured
//!   Normal ────────────────▶ AwaitingContact ────────────────────────▶ (removed)
//!                              │      ▲
//!                              └──────┘
//!                extraction failed / new unmatched query (overwrite)
//! ```
//!
//! The [`SessionStore`] trait is the injection point for storage backends.
//! Transition rules live in [`SessionState`]; the application wraps a store
//! with per-session locking so one conversation's turns never interleave.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Session key used when the caller supplies none.
pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Normal,
    AwaitingContact,
}

/// State of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub status: SessionStatus,
    /// Set only while `status` is `AwaitingContact`.
    pub pending_product_query: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn normal(now: DateTime<Utc>) -> Self {
        Self {
            status: SessionStatus::Normal,
            pending_product_query: None,
            updated_at: now,
        }
    }

    /// The state after an unmatched product query. Replaces any earlier
    /// pending query.
    pub fn awaiting_contact(query: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: SessionStatus::AwaitingContact,
            pending_product_query: Some(query.into()),
            updated_at: now,
        }
    }

    pub fn is_awaiting_contact(&self) -> bool {
        self.status == SessionStatus::AwaitingContact
    }

    /// True when this pending state was last touched before `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_awaiting_contact() && self.updated_at < cutoff
    }
}

/// Key-value storage for session state.
///
/// Implementations must be `Send + Sync`. They are not required to
/// serialize concurrent access to one key; callers do that.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current state, or `None` for a session that is `Normal`.
    async fn get(&self, session_id: &str) -> Result<Option<SessionState>>;

    /// Insert or replace the state of a session.
    async fn put(&self, session_id: &str, state: SessionState) -> Result<()>;

    /// Delete a session. Deleting an unknown session is not an error.
    async fn remove(&self, session_id: &str) -> Result<()>;

    /// Delete every pending session last updated before `cutoff`,
    /// returning how many were removed.
    async fn remove_stale(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Number of stored sessions.
    async fn len(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_awaiting_contact_carries_query() {
        let now = Utc::now();
        let s = SessionState::awaiting_contact("Epoksi ile 600 derece", now);
        assert!(s.is_awaiting_contact());
        assert_eq!(s.pending_product_query.as_deref(), Some("Epoksi ile 600 derece"));
        assert!(!SessionState::normal(now).is_awaiting_contact());
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let s = SessionState::awaiting_contact("x", now - Duration::minutes(31));
        assert!(s.is_stale(now - Duration::minutes(30)));
        assert!(!s.is_stale(now - Duration::minutes(40)));
        assert!(!SessionState::normal(now - Duration::days(1)).is_stale(now));
    }
}
