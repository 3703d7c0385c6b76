use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub name: String,
    pub url: String,
}

/// Initial media state for a room token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaDefaults {
    pub start_audio_off: bool,
    pub start_video_off: bool,
}

impl MediaDefaults {
    pub fn muted() -> Self {
        Self {
            start_audio_off: true,
            start_video_off: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room service request failed: {0}")]
    Request(String),

    #[error("room service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed room service response: {0}")]
    Malformed(String),
}

/// Port for the external audio/video room service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomProvider: Send + Sync {
    /// Creates the room, or fetches it when it already exists.
    async fn ensure_room(&self, name: &str, expires_at: DateTime<Utc>) -> Result<Room, RoomError>;

    async fn issue_room_token(
        &self,
        name: &str,
        expires_at: DateTime<Utc>,
        is_owner: bool,
        media: MediaDefaults,
    ) -> Result<String, RoomError>;

    async fn delete_room(&self, name: &str) -> Result<(), RoomError>;
}
