use huddle_protocol::RelayEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::application::connections::{CloseReason, ConnectionCloser};
use crate::application::ports::UpstreamFrame;
use crate::application::scope_guard::ScopeGuard;
use crate::application::services::Services;
use crate::domain::{ClientIdentity, Session, SessionId};
use crate::infrastructure::driven::persistence::{SessionLookup, UsageError};

use super::messages::{ClientFrame, ClientMessage, ServerFrame};

/// Sequential worker for one connection's inbound frames.
///
/// Exactly one frame is in flight at a time: the next frame is not looked at
/// until the previous one's verdict, quota change and forward/drop decision
/// are committed.
pub struct InboundPipeline {
    services: Arc<Services>,
    guard: Arc<ScopeGuard>,
    session_id: SessionId,
    client: ClientIdentity,
    closer: ConnectionCloser,
    upstream: mpsc::Sender<UpstreamFrame>,
    outbound: mpsc::Sender<ServerFrame>,
    last_blocked: bool,
}

impl InboundPipeline {
    pub fn new(
        services: Arc<Services>,
        guard: Arc<ScopeGuard>,
        session_id: SessionId,
        client: ClientIdentity,
        closer: ConnectionCloser,
        upstream: mpsc::Sender<UpstreamFrame>,
        outbound: mpsc::Sender<ServerFrame>,
    ) -> Self {
        Self {
            services,
            guard,
            session_id,
            client,
            closer,
            upstream,
            outbound,
            last_blocked: false,
        }
    }

    pub async fn run(mut self, mut inbound: mpsc::Receiver<ClientFrame>) {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.closer.closed() => break,
                frame = inbound.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            if let Err(reason) = self.handle(frame).await {
                self.closer.close(reason);
            }
            if self.closer.is_closed() {
                break;
            }
        }
        debug!("inbound pipeline for {} on {} stopped", self.client, self.session_id);
    }

    async fn handle(&mut self, frame: ClientFrame) -> Result<(), CloseReason> {
        let text = match frame {
            ClientFrame::Binary(bytes) => {
                self.last_blocked = false;
                return self.forward(UpstreamFrame::Binary(bytes)).await;
            }
            ClientFrame::Text(text) => text,
        };

        match ClientMessage::classify(&text) {
            ClientMessage::UserContent(candidate) => self.handle_user_content(text, &candidate).await,
            ClientMessage::GenerationTrigger if self.last_blocked => {
                self.last_blocked = false;
                debug!("dropped generation trigger after blocked message from {}", self.client);
                Ok(())
            }
            ClientMessage::SessionOverride => {
                self.last_blocked = false;
                self.emit(RelayEvent::error(
                    "session_override_rejected",
                    "session configuration is managed by the server",
                ))
                .await
            }
            ClientMessage::GenerationTrigger | ClientMessage::Other => {
                self.last_blocked = false;
                self.forward(UpstreamFrame::Text(text)).await
            }
        }
    }

    async fn handle_user_content(&mut self, raw: String, candidate: &str) -> Result<(), CloseReason> {
        let session = self.live_session().await?;
        if session.quota_for(&self.client).is_exhausted() {
            return self.limit_reached().await;
        }

        let verdict = self
            .guard
            .check_in_scope(session.scope(), session.context(), candidate)
            .await;
        if self.closer.is_closed() {
            debug!("discarding scope verdict for closed connection {}", self.client);
            return Ok(());
        }
        if !verdict.in_scope {
            self.last_blocked = true;
            let reason = verdict.reason.unwrap_or_else(|| "message is outside the session scope".to_string());
            return self.emit(RelayEvent::ScopeViolation { reason }).await;
        }

        let quota = match self.services.registry.record_usage(&self.session_id, &self.client).await {
            Ok(quota) => quota,
            Err(UsageError::QuotaExhausted(_)) => return self.limit_reached().await,
            Err(UsageError::SessionUnavailable) => return Err(CloseReason::SessionExpired),
        };
        self.last_blocked = false;
        if self.closer.is_closed() {
            self.refund().await;
            return Ok(());
        }
        if let Err(reason) = self.forward(UpstreamFrame::Text(raw)).await {
            self.refund().await;
            return Err(reason);
        }
        self.emit(RelayEvent::QuotaUpdate { quota }).await?;
        debug!("forwarded user message from {} ({}/{})", self.client, quota.used, quota.limit);

        if quota.is_exhausted() {
            return self.limit_reached().await;
        }
        Ok(())
    }

    /// Always re-read: usage is shared with other connections and REST calls.
    async fn live_session(&self) -> Result<Session, CloseReason> {
        match self.services.registry.lookup(&self.session_id).await {
            SessionLookup::Live(session) => Ok(session),
            SessionLookup::Expired(_) => Err(CloseReason::SessionExpired),
            SessionLookup::Missing => Err(CloseReason::SessionEnded),
        }
    }

    async fn limit_reached(&mut self) -> Result<(), CloseReason> {
        let Some(quota) = self.services.registry.quota(&self.session_id, &self.client).await else {
            return Err(CloseReason::SessionEnded);
        };
        self.emit(RelayEvent::LimitReached { quota }).await?;
        Err(CloseReason::LimitReached)
    }

    /// Gives back a charge for a message that never reached the upstream.
    async fn refund(&self) {
        if let Some(quota) = self.services.registry.release_usage(&self.session_id, &self.client).await {
            debug!("refunded usage for {} ({}/{})", self.client, quota.used, quota.limit);
        }
    }

    fn close_reason(&self) -> CloseReason {
        self.closer.reason().unwrap_or(CloseReason::ClientClosed)
    }

    async fn forward(&self, frame: UpstreamFrame) -> Result<(), CloseReason> {
        tokio::select! {
            biased;
            _ = self.closer.closed() => Err(self.close_reason()),
            sent = self.upstream.send(frame) => sent.map_err(|_| CloseReason::UpstreamClosed),
        }
    }

    // A client that stops reading must not pin this task once the connection closes.
    async fn emit(&self, event: RelayEvent) -> Result<(), CloseReason> {
        tokio::select! {
            biased;
            _ = self.closer.closed() => Err(self.close_reason()),
            sent = self.outbound.send(ServerFrame::Text(event.to_json())) => {
                sent.map_err(|_| CloseReason::ClientClosed)
            }
        }
    }
}
