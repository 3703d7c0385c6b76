use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::application::ports::{RealtimeUpstream, UpstreamError, UpstreamFrame, UpstreamLink};

pub const DEFAULT_URL: &str = "wss://api.openai.com/v1/realtime";
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

const CHANNEL_CAPACITY: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Realtime AI service reached over a WebSocket.
pub struct WebSocketUpstream {
    url: Url,
    api_key: String,
}

impl WebSocketUpstream {
    pub fn new(base_url: &str, api_key: impl Into<String>, model: &str) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(base_url)?;
        url.query_pairs_mut().append_pair("model", model);
        Ok(Self {
            url,
            api_key: api_key.into(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RealtimeUpstream for WebSocketUpstream {
    async fn connect(&self, shutdown: CancellationToken) -> Result<UpstreamLink, UpstreamError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| UpstreamError::Connect(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| UpstreamError::Connect(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| UpstreamError::Connect(e.to_string()))?;
        debug!("connected to realtime upstream {}", self.url.host_str().unwrap_or_default());

        let (to_upstream, outbound) = mpsc::channel(CHANNEL_CAPACITY);
        let (inbound, from_upstream) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(pump(ws, outbound, inbound, shutdown));
        Ok(UpstreamLink {
            sender: to_upstream,
            receiver: from_upstream,
        })
    }
}

/// Moves frames between the socket and the link channels until either side
/// goes away.
async fn pump(
    ws: WsStream,
    mut outbound: mpsc::Receiver<UpstreamFrame>,
    inbound: mpsc::Sender<UpstreamFrame>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = outbound.recv() => {
                let message = match frame {
                    Some(UpstreamFrame::Text(text)) => Message::Text(text),
                    Some(UpstreamFrame::Binary(bytes)) => Message::Binary(bytes),
                    None => break,
                };
                if let Err(e) = ws_tx.send(message).await {
                    warn!("realtime upstream send failed: {}", e);
                    break;
                }
            }
            msg = ws_rx.next() => {
                let frame = match msg {
                    Some(Ok(Message::Text(text))) => UpstreamFrame::Text(text),
                    Some(Ok(Message::Binary(bytes))) => UpstreamFrame::Binary(bytes),
                    Some(Ok(Message::Close(frame))) => {
                        debug!("realtime upstream closed: {:?}", frame);
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("realtime upstream read failed: {}", e);
                        break;
                    }
                    None => break,
                };
                if inbound.send(frame).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = ws_tx.send(Message::Close(None)).await;
    debug!("realtime upstream pump stopped");
}
