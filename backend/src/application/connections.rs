use dashmap::DashMap;
use huddle_protocol::close_codes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

use crate::domain::SessionId;

/// Why a relay connection was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    UpstreamClosed,
    UpstreamUnavailable,
    SessionExpired,
    SessionEnded,
    LimitReached,
    BacklogExceeded,
    Internal,
}

impl CloseReason {
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::ClientClosed | CloseReason::UpstreamClosed => close_codes::NORMAL,
            CloseReason::UpstreamUnavailable => close_codes::UPSTREAM_UNAVAILABLE,
            CloseReason::SessionExpired => close_codes::SESSION_EXPIRED,
            CloseReason::SessionEnded => close_codes::SESSION_ENDED,
            CloseReason::LimitReached => close_codes::LIMIT_REACHED,
            CloseReason::BacklogExceeded => close_codes::BACKLOG_EXCEEDED,
            CloseReason::Internal => close_codes::INTERNAL,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client closed",
            CloseReason::UpstreamClosed => "upstream closed",
            CloseReason::UpstreamUnavailable => "upstream unavailable",
            CloseReason::SessionExpired => "session expired",
            CloseReason::SessionEnded => "session ended",
            CloseReason::LimitReached => "usage limit reached",
            CloseReason::BacklogExceeded => "backlog exceeded",
            CloseReason::Internal => "internal error",
        }
    }
}

/// Close signal for one connection. The first reason wins; closing again is
/// a no-op.
#[derive(Clone, Default)]
pub struct ConnectionCloser {
    token: CancellationToken,
    reason: Arc<OnceLock<CloseReason>>,
}

impl ConnectionCloser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self, reason: CloseReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn closed(&self) {
        self.token.cancelled().await
    }

    pub fn reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }

    /// Token cancelled together with this connection.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// Live relay connections per session, kept only so they can be force-closed.
#[derive(Default)]
pub struct ConnectionTracker {
    connections: DashMap<SessionId, HashMap<u64, ConnectionCloser>>,
    next_id: AtomicU64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(self: &Arc<Self>, session_id: &SessionId) -> TrackedConnection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let closer = ConnectionCloser::new();
        self.connections
            .entry(session_id.clone())
            .or_default()
            .insert(id, closer.clone());
        TrackedConnection {
            tracker: Arc::clone(self),
            session_id: session_id.clone(),
            id,
            closer,
        }
    }

    /// Closes and forgets every connection of a session.
    pub fn close_session(&self, session_id: &SessionId, reason: CloseReason) -> usize {
        match self.connections.remove(session_id) {
            Some((_, connections)) => {
                for closer in connections.values() {
                    closer.close(reason);
                }
                connections.len()
            }
            None => 0,
        }
    }

    pub fn open_connections(&self, session_id: &SessionId) -> usize {
        self.connections
            .get(session_id)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    fn release(&self, session_id: &SessionId, id: u64) {
        if let Some(mut connections) = self.connections.get_mut(session_id) {
            connections.remove(&id);
        }
        self.connections.remove_if(session_id, |_, c| c.is_empty());
    }
}

/// Registration guard; dropping it removes the connection from the tracker.
pub struct TrackedConnection {
    tracker: Arc<ConnectionTracker>,
    session_id: SessionId,
    id: u64,
    closer: ConnectionCloser,
}

impl TrackedConnection {
    pub fn closer(&self) -> &ConnectionCloser {
        &self.closer
    }
}

impl Drop for TrackedConnection {
    fn drop(&mut self) {
        self.tracker.release(&self.session_id, self.id);
    }
}
