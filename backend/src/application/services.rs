use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::authorization::AuthorizationService;
use crate::application::connections::{CloseReason, ConnectionTracker};
use crate::application::error::AppError;
use crate::application::join_feed::JoinStatusFeed;
use crate::application::ports::{Clock, RoomProvider};
use crate::domain::{Session, SessionId};
use crate::infrastructure::driven::persistence::{SessionLookup, SessionRegistry};

/// Upper bound on one room deletion during teardown.
pub const ROOM_RELEASE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Limits applied to newly created sessions and capabilities.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub ttl: Duration,
    pub usage_limit: u32,
    pub ai_capability_ttl: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(1),
            usage_limit: 20,
            ai_capability_ttl: Duration::minutes(10),
        }
    }
}

/// Everything the session commands need, built once per process.
pub struct Services {
    pub registry: Arc<SessionRegistry>,
    pub authz: Arc<AuthorizationService>,
    pub rooms: Option<Arc<dyn RoomProvider>>,
    pub tracker: Arc<ConnectionTracker>,
    pub join_feed: Arc<JoinStatusFeed>,
    pub clock: Arc<dyn Clock>,
    pub policy: SessionPolicy,
}

impl Services {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn rooms(&self) -> Result<&Arc<dyn RoomProvider>, AppError> {
        self.rooms.as_ref().ok_or(AppError::Configuration("room service"))
    }

    /// Fetches a live session. An expired one is retired on the spot and
    /// reported as gone.
    pub async fn live_session(&self, id: &SessionId) -> Result<Session, AppError> {
        match self.registry.lookup(id).await {
            SessionLookup::Live(session) => Ok(session),
            SessionLookup::Expired(_) => {
                self.retire_session(id, CloseReason::SessionExpired).await;
                Err(AppError::Gone)
            }
            SessionLookup::Missing => Err(AppError::NotFound("session")),
        }
    }

    pub fn require_host(&self, token: Option<&str>, session_id: &SessionId) -> Result<(), AppError> {
        match token {
            Some(token) if self.authz.verify_host_capability(token, session_id) => Ok(()),
            _ => Err(AppError::Forbidden("host capability required")),
        }
    }

    /// Deletes the session, closes its relay connections and releases its
    /// room. Returns false if another caller retired it first.
    pub async fn retire_session(&self, id: &SessionId, reason: CloseReason) -> bool {
        match self.detach_session(id, reason).await {
            Some(session) => {
                self.release_room(&session.room_name()).await;
                true
            }
            None => false,
        }
    }

    /// The local half of retiring: registry entry, join feed and relay
    /// connections. The room is left for the caller to release.
    pub async fn detach_session(&self, id: &SessionId, reason: CloseReason) -> Option<Session> {
        let session = self.registry.delete(id).await?;
        self.join_feed.retire_session(id);
        let closed = self.tracker.close_session(id, reason);
        info!(
            "retired session {} ({}), closed {} relay connection(s)",
            id,
            reason.description(),
            closed
        );
        Some(session)
    }

    /// Best-effort room deprovisioning, bounded by [`ROOM_RELEASE_TIMEOUT`].
    /// Failures are logged and discarded.
    pub async fn release_room(&self, name: &str) {
        let Some(rooms) = &self.rooms else {
            return;
        };
        match tokio::time::timeout(ROOM_RELEASE_TIMEOUT, rooms.delete_room(name)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("failed to delete room {}: {}", name, e),
            Err(_) => warn!("gave up deleting room {} after {:?}", name, ROOM_RELEASE_TIMEOUT),
        }
    }
}
