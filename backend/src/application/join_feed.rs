use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::watch;

use crate::domain::{JoinRequest, JoinRequestId, JoinStatus, RequestedRole, SessionId};

/// Public view of a join request. Room fields are only populated once
/// admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinRequestView {
    pub request_id: JoinRequestId,
    pub status: JoinStatus,
    pub requested_role: RequestedRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RequestedRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_token: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl From<&JoinRequest> for JoinRequestView {
    fn from(request: &JoinRequest) -> Self {
        let grant = request.grant();
        Self {
            request_id: request.id,
            status: request.status(),
            requested_role: request.requested_role,
            role: grant.map(|g| g.final_role),
            room_url: grant.map(|g| g.room_url.clone()),
            room_token: grant.map(|g| g.room_token.clone()),
            created_at: request.created_at,
            decided_at: request.decided_at(),
        }
    }
}

/// Push channel per pending join request.
#[derive(Default)]
pub struct JoinStatusFeed {
    channels: DashMap<(SessionId, JoinRequestId), watch::Sender<JoinRequestView>>,
}

impl JoinStatusFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, session_id: &SessionId, view: JoinRequestView) {
        let (tx, _rx) = watch::channel(view.clone());
        self.channels.insert((session_id.clone(), view.request_id), tx);
    }

    /// Publishes a status change; the channel is dropped once terminal so
    /// subscribers end after receiving it.
    pub fn publish(&self, session_id: &SessionId, view: JoinRequestView) {
        let key = (session_id.clone(), view.request_id);
        let terminal = view.status.is_terminal();
        if let Some(tx) = self.channels.get(&key) {
            tx.send_replace(view);
        }
        if terminal {
            self.channels.remove(&key);
        }
    }

    pub fn subscribe(
        &self,
        session_id: &SessionId,
        request_id: &JoinRequestId,
    ) -> Option<watch::Receiver<JoinRequestView>> {
        self.channels
            .get(&(session_id.clone(), *request_id))
            .map(|tx| tx.subscribe())
    }

    pub fn retire_session(&self, session_id: &SessionId) {
        self.channels.retain(|(sid, _), _| sid != session_id);
    }
}

/// One item per status change, starting with the current one. Ends after a
/// terminal status or when the channel is dropped.
pub fn status_updates(rx: watch::Receiver<JoinRequestView>) -> impl Stream<Item = JoinRequestView> {
    stream::unfold((rx, true, false), |(mut rx, first, done)| async move {
        if done {
            return None;
        }
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let view = rx.borrow_and_update().clone();
        let terminal = view.status.is_terminal();
        Some((view, (rx, false, terminal)))
    })
}
