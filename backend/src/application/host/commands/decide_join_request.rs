use tracing::info;

use crate::application::error::AppError;
use crate::application::join_feed::JoinRequestView;
use crate::application::ports::MediaDefaults;
use crate::application::services::Services;
use crate::domain::{JoinRequestId, RequestedRole, RoomGrant, SessionId};

/// Admits a pending join request: provisions the room, mints a role-scoped
/// room token and records the decision. Concurrent decisions on the same
/// request have exactly one winner; the others get `Conflict`.
pub async fn admit(
    services: &Services,
    session_id: &SessionId,
    request_id: &JoinRequestId,
    host_token: Option<&str>,
) -> Result<JoinRequestView, AppError> {
    let session = services.live_session(session_id).await?;
    services.require_host(host_token, session_id)?;
    let request = session
        .join_request(request_id)
        .ok_or(AppError::NotFound("join request"))?;
    if request.status().is_terminal() {
        return Err(AppError::Conflict(format!("join request is already {}", request.status())));
    }

    let final_role = request.requested_role;
    let media = match final_role {
        RequestedRole::Participant => MediaDefaults::default(),
        RequestedRole::Observer => MediaDefaults::muted(),
    };
    let rooms = services.rooms()?;
    let room = rooms.ensure_room(&session.room_name(), session.expires_at).await?;
    let room_token = rooms
        .issue_room_token(&room.name, session.expires_at, false, media)
        .await?;

    let grant = RoomGrant {
        room_url: room.url,
        room_token,
        final_role,
    };
    let now = services.now();
    let view = services
        .registry
        .update(session_id, |s| {
            let request = s
                .join_request_mut(request_id)
                .ok_or(AppError::NotFound("join request"))?;
            request.admit(grant, now)?;
            Ok::<_, AppError>(JoinRequestView::from(&*request))
        })
        .await
        .ok_or(AppError::NotFound("session"))??;

    services.join_feed.publish(session_id, view.clone());
    info!("admitted join request {} to session {} as {:?}", request_id, session_id, final_role);
    Ok(view)
}

pub async fn deny(
    services: &Services,
    session_id: &SessionId,
    request_id: &JoinRequestId,
    host_token: Option<&str>,
) -> Result<JoinRequestView, AppError> {
    services.live_session(session_id).await?;
    services.require_host(host_token, session_id)?;

    let now = services.now();
    let view = services
        .registry
        .update(session_id, |s| {
            let request = s
                .join_request_mut(request_id)
                .ok_or(AppError::NotFound("join request"))?;
            request.deny(now)?;
            Ok::<_, AppError>(JoinRequestView::from(&*request))
        })
        .await
        .ok_or(AppError::NotFound("session"))??;

    services.join_feed.publish(session_id, view.clone());
    info!("denied join request {} for session {}", request_id, session_id);
    Ok(view)
}
