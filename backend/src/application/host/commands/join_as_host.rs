use serde::Serialize;
use tracing::info;

use crate::application::error::AppError;
use crate::application::ports::MediaDefaults;
use crate::application::services::Services;
use crate::domain::{CapabilityRole, SessionId};

#[derive(Debug, Serialize)]
pub struct HostRoomAccess {
    pub role: CapabilityRole,
    pub room_name: String,
    pub room_url: String,
    pub room_token: String,
}

/// Provisions (or fetches) the session room and mints an owner token.
pub async fn execute(
    services: &Services,
    session_id: &SessionId,
    host_token: Option<&str>,
) -> Result<HostRoomAccess, AppError> {
    let session = services.live_session(session_id).await?;
    services.require_host(host_token, session_id)?;

    let rooms = services.rooms()?;
    let room = rooms.ensure_room(&session.room_name(), session.expires_at).await?;
    let room_token = rooms
        .issue_room_token(&room.name, session.expires_at, true, MediaDefaults::default())
        .await?;

    info!("host joined room {} for session {}", room.name, session_id);
    Ok(HostRoomAccess {
        role: CapabilityRole::Host,
        room_name: room.name,
        room_url: room.url,
        room_token,
    })
}
