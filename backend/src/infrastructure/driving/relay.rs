use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::application::relay::{self, bridge, Admission, ClientFrame, RelayContext, RelayParams, RelayRejection, ServerFrame};
use crate::domain::SessionId;
use crate::infrastructure::driving::http::error::ErrorResponse;
use crate::infrastructure::AppState;

const FRAME_CHANNEL_CAPACITY: usize = 64;

impl IntoResponse for RelayRejection {
    fn into_response(self) -> Response {
        let status = match self {
            RelayRejection::Misconfigured => StatusCode::SERVICE_UNAVAILABLE,
            RelayRejection::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayRejection::SessionUnavailable | RelayRejection::ForbiddenKind | RelayRejection::ForbiddenRole => {
                StatusCode::FORBIDDEN
            }
            RelayRejection::QuotaExhausted => StatusCode::TOO_MANY_REQUESTS,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

/// GET /api/sessions/:id/ai/relay?role=..&token=..
///
/// Admission runs before the upgrade so refusals are plain HTTP responses.
pub async fn relay_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RelayParams>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let session_id = SessionId::from_string(id);
    let admission = match relay::authorize(&state.relay, &session_id, &params).await {
        Ok(admission) => admission,
        Err(rejection) => {
            debug!("relay connection to {} refused: {}", session_id, rejection);
            return rejection.into_response();
        }
    };
    let Some(ws) = ws else {
        return (
            StatusCode::UPGRADE_REQUIRED,
            Json(ErrorResponse {
                error: "websocket upgrade required".to_string(),
            }),
        )
            .into_response();
    };

    info!("relay connection authorized for {} on {}", admission.client, session_id);
    let ctx = state.relay.clone();
    ws.on_upgrade(move |socket| serve_socket(socket, ctx, admission))
}

async fn serve_socket(socket: WebSocket, ctx: Arc<RelayContext>, admission: Admission) {
    let (sender, receiver) = socket.split();
    let (client_tx, client_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let (server_tx, server_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

    let bridge = tokio::spawn(bridge::run(ctx, admission, client_rx, server_tx));
    let mut writer = tokio::spawn(write_frames(sender, server_rx));

    tokio::select! {
        _ = read_frames(receiver, client_tx) => {}
        _ = &mut writer => {}
    }
    let _ = bridge.await;
    let _ = writer.await;
}

/// Client socket to bridge. Returning drops the sender, which the bridge
/// reads as the client hanging up.
async fn read_frames(mut receiver: SplitStream<WebSocket>, client_tx: mpsc::Sender<ClientFrame>) {
    while let Some(msg) = receiver.next().await {
        let frame = match msg {
            Ok(Message::Text(text)) => ClientFrame::Text(text),
            Ok(Message::Binary(bytes)) => ClientFrame::Binary(bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("relay client read failed: {}", e);
                break;
            }
        };
        if client_tx.send(frame).await.is_err() {
            break;
        }
    }
}

async fn write_frames(mut sender: SplitSink<WebSocket, Message>, mut server_rx: mpsc::Receiver<ServerFrame>) {
    while let Some(frame) = server_rx.recv().await {
        let message = match frame {
            ServerFrame::Text(text) => Message::Text(text),
            ServerFrame::Binary(bytes) => Message::Binary(bytes),
            ServerFrame::Close(reason) => {
                let close = CloseFrame {
                    code: reason.code(),
                    reason: reason.description().into(),
                };
                let _ = sender.send(Message::Close(Some(close))).await;
                break;
            }
        };
        if sender.send(message).await.is_err() {
            break;
        }
    }
}
