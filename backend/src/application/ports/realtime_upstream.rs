use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A frame exchanged with the upstream realtime service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Open upstream connection.
///
/// Dropping `sender` or cancelling the shutdown token handed to
/// [`RealtimeUpstream::connect`] closes the upstream socket; `receiver`
/// yields `None` once the upstream side is gone.
pub struct UpstreamLink {
    pub sender: mpsc::Sender<UpstreamFrame>,
    pub receiver: mpsc::Receiver<UpstreamFrame>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream connect failed: {0}")]
    Connect(String),
}

/// Port for the third-party realtime AI service.
#[async_trait]
pub trait RealtimeUpstream: Send + Sync {
    /// Resolves once the upstream handshake has completed.
    async fn connect(&self, shutdown: CancellationToken) -> Result<UpstreamLink, UpstreamError>;
}
