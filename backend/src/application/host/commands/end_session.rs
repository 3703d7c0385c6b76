use crate::application::connections::CloseReason;
use crate::application::error::AppError;
use crate::application::services::Services;
use crate::domain::SessionId;

/// Deletes the session, closes its relay connections and releases the room.
pub async fn execute(
    services: &Services,
    session_id: &SessionId,
    host_token: Option<&str>,
) -> Result<(), AppError> {
    services.live_session(session_id).await?;
    services.require_host(host_token, session_id)?;

    if !services.retire_session(session_id, CloseReason::SessionEnded).await {
        return Err(AppError::NotFound("session"));
    }
    Ok(())
}
