use huddle_protocol::{QuotaSnapshot, RelayEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::connections::{CloseReason, ConnectionCloser};
use crate::application::ports::{UpstreamFrame, UpstreamLink};
use crate::domain::{ClientIdentity, Session, SessionId};
use crate::infrastructure::driven::persistence::SessionLookup;

use super::admission::Admission;
use super::messages::{session_directive, ClientFrame, ServerFrame};
use super::pipeline::InboundPipeline;
use super::RelayContext;

/// How long a client that stopped reading gets to take the final close frame.
const CLOSE_FRAME_GRACE: Duration = Duration::from_secs(1);

/// Drives one admitted connection until it closes.
///
/// `client_rx` yields frames from the client and ends when the client goes
/// away; everything for the client goes out through `client_tx`, ending with
/// exactly one [`ServerFrame::Close`].
pub async fn run(
    ctx: Arc<RelayContext>,
    admission: Admission,
    mut client_rx: mpsc::Receiver<ClientFrame>,
    client_tx: mpsc::Sender<ServerFrame>,
) {
    let Admission {
        session_id,
        client,
        quota,
    } = admission;
    let tracked = ctx.services.tracker.register(&session_id);
    let closer = tracked.closer().clone();

    // The session may have been retired between admission and registration.
    let session = match ctx.services.registry.lookup(&session_id).await {
        SessionLookup::Live(session) => Some(session),
        SessionLookup::Expired(_) => {
            closer.close(CloseReason::SessionExpired);
            None
        }
        SessionLookup::Missing => {
            closer.close(CloseReason::SessionEnded);
            None
        }
    };

    let (pending_tx, pending_rx) = mpsc::channel(ctx.pending_limit.max(1));
    let link = match session {
        Some(_) => connect(&ctx, &closer, &mut client_rx, &pending_tx).await,
        None => None,
    };

    if let (Some(session), Some(mut link)) = (session, link) {
        info!("relay bridging {} on session {}", client, session_id);
        match start_bridge(&ctx, &closer, &session_id, &client, quota, &session, &link, &client_tx).await {
            Ok(()) => {
                let pipeline = InboundPipeline::new(
                    ctx.services.clone(),
                    ctx.guard.clone(),
                    session_id.clone(),
                    client.clone(),
                    closer.clone(),
                    link.sender.clone(),
                    client_tx.clone(),
                );
                tokio::spawn(pipeline.run(pending_rx));
                bridge_loop(&closer, &mut client_rx, &pending_tx, &mut link, &client_tx).await;
            }
            Err(reason) => closer.close(reason),
        }
    }

    let reason = closer.reason().unwrap_or(CloseReason::Internal);
    closer.close(reason);
    if tokio::time::timeout(CLOSE_FRAME_GRACE, client_tx.send(ServerFrame::Close(reason)))
        .await
        .is_err()
    {
        debug!("client {} not reading, dropping close frame", client);
    }
    info!(
        "relay for {} on session {} closed: {}",
        client,
        session_id,
        reason.description()
    );
    drop(tracked);
}

/// Opens the upstream while queueing client frames in arrival order.
async fn connect(
    ctx: &RelayContext,
    closer: &ConnectionCloser,
    client_rx: &mut mpsc::Receiver<ClientFrame>,
    pending_tx: &mpsc::Sender<ClientFrame>,
) -> Option<UpstreamLink> {
    let Some(upstream) = ctx.upstream.clone() else {
        closer.close(CloseReason::UpstreamUnavailable);
        return None;
    };
    let connecting = upstream.connect(closer.child_token());
    tokio::pin!(connecting);

    loop {
        tokio::select! {
            biased;
            _ = closer.closed() => return None,
            result = &mut connecting => match result {
                Ok(link) => return Some(link),
                Err(e) => {
                    warn!("realtime upstream unavailable: {}", e);
                    closer.close(CloseReason::UpstreamUnavailable);
                    return None;
                }
            },
            frame = client_rx.recv() => match frame {
                Some(frame) => {
                    if pending_tx.try_send(frame).is_err() {
                        closer.close(CloseReason::BacklogExceeded);
                        return None;
                    }
                }
                None => {
                    closer.close(CloseReason::ClientClosed);
                    return None;
                }
            },
        }
    }
}

/// Applies the session directive, then tells the client it may talk.
///
/// The quota reported is re-read from the registry; `admitted_quota` is only
/// used if the session vanished in the meantime.
#[allow(clippy::too_many_arguments)]
async fn start_bridge(
    ctx: &RelayContext,
    closer: &ConnectionCloser,
    session_id: &SessionId,
    client: &ClientIdentity,
    admitted_quota: QuotaSnapshot,
    session: &Session,
    link: &UpstreamLink,
    client_tx: &mpsc::Sender<ServerFrame>,
) -> Result<(), CloseReason> {
    let directive = session_directive(session.scope(), session.context());
    tokio::select! {
        biased;
        _ = closer.closed() => return Err(closer.reason().unwrap_or(CloseReason::ClientClosed)),
        sent = link.sender.send(UpstreamFrame::Text(directive)) => {
            sent.map_err(|_| CloseReason::UpstreamClosed)?
        }
    }

    let quota = ctx
        .services
        .registry
        .quota(session_id, client)
        .await
        .unwrap_or(admitted_quota);
    for event in [RelayEvent::UpstreamReady, RelayEvent::Quota { quota }] {
        deliver(closer, client_tx, ServerFrame::Text(event.to_json())).await?;
    }
    Ok(())
}

/// Sends to the client unless the connection closes first.
async fn deliver(
    closer: &ConnectionCloser,
    client_tx: &mpsc::Sender<ServerFrame>,
    frame: ServerFrame,
) -> Result<(), CloseReason> {
    tokio::select! {
        biased;
        _ = closer.closed() => Err(closer.reason().unwrap_or(CloseReason::ClientClosed)),
        sent = client_tx.send(frame) => sent.map_err(|_| CloseReason::ClientClosed),
    }
}

async fn bridge_loop(
    closer: &ConnectionCloser,
    client_rx: &mut mpsc::Receiver<ClientFrame>,
    pending_tx: &mpsc::Sender<ClientFrame>,
    link: &mut UpstreamLink,
    client_tx: &mpsc::Sender<ServerFrame>,
) {
    loop {
        tokio::select! {
            biased;
            _ = closer.closed() => break,
            frame = link.receiver.recv() => {
                let frame = match frame {
                    Some(UpstreamFrame::Text(text)) => ServerFrame::Text(text),
                    Some(UpstreamFrame::Binary(bytes)) => ServerFrame::Binary(bytes),
                    None => {
                        debug!("realtime upstream closed");
                        closer.close(CloseReason::UpstreamClosed);
                        break;
                    }
                };
                if let Err(reason) = deliver(closer, client_tx, frame).await {
                    closer.close(reason);
                }
            }
            frame = client_rx.recv() => match frame {
                Some(frame) => {
                    if pending_tx.try_send(frame).is_err() {
                        warn!("relay inbound backlog exceeded");
                        closer.close(CloseReason::BacklogExceeded);
                    }
                }
                None => closer.close(CloseReason::ClientClosed),
            },
        }
    }
}
