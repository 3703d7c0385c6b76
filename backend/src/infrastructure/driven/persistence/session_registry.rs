use chrono::{DateTime, Duration, Utc};
use huddle_protocol::QuotaSnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::application::ports::Clock;
use crate::domain::{ClientIdentity, DomainError, Session, SessionId, SessionKind};

/// Result of looking a session up at the current instant.
#[derive(Debug, Clone)]
pub enum SessionLookup {
    Live(Session),
    Expired(Session),
    Missing,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("session is gone")]
    SessionUnavailable,

    #[error("usage limit reached")]
    QuotaExhausted(QuotaSnapshot),
}

/// In-memory, process-local session store.
///
/// Shared by request handlers, relay connections and the reaper; every
/// mutation happens under the write lock so callers need no extra
/// synchronization.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn is_expired(session: &Session, now: DateTime<Utc>) -> bool {
        session.is_expired(now)
    }

    pub async fn create(
        &self,
        kind: SessionKind,
        scope: Option<String>,
        context: Option<String>,
        usage_limit: u32,
        ttl: Duration,
    ) -> Result<Session, DomainError> {
        let session = Session::new(kind, scope, context, usage_limit, self.now(), ttl)?;
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    /// Raw read, regardless of expiry.
    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    pub async fn lookup(&self, id: &SessionId) -> SessionLookup {
        let now = self.now();
        match self.get(id).await {
            Some(session) if session.is_expired(now) => SessionLookup::Expired(session),
            Some(session) => SessionLookup::Live(session),
            None => SessionLookup::Missing,
        }
    }

    pub async fn delete(&self, id: &SessionId) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id)
    }

    pub async fn enumerate(&self) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }

    /// Applies `f` to the stored session atomically.
    pub async fn update<T>(&self, id: &SessionId, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(f)
    }

    /// Counts one accepted message against the live session entry.
    pub async fn record_usage(
        &self,
        id: &SessionId,
        client: &ClientIdentity,
    ) -> Result<QuotaSnapshot, UsageError> {
        let now = self.now();
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .filter(|s| !s.is_expired(now))
            .ok_or(UsageError::SessionUnavailable)?;
        session
            .record_usage(client)
            .map_err(|_| UsageError::QuotaExhausted(session.quota_for(client)))
    }

    /// Returns a charge taken by `record_usage`. None if the session is gone.
    pub async fn release_usage(&self, id: &SessionId, client: &ClientIdentity) -> Option<QuotaSnapshot> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(|s| s.release_usage(client))
    }

    pub async fn quota(&self, id: &SessionId, client: &ClientIdentity) -> Option<QuotaSnapshot> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(|s| s.quota_for(client))
    }
}
