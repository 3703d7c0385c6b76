use serde::Deserialize;
use tracing::info;

use crate::application::error::AppError;
use crate::application::join_feed::JoinRequestView;
use crate::application::services::Services;
use crate::domain::{RequestedRole, SessionId};

#[derive(Debug, Deserialize)]
pub struct RequestJoinCommand {
    pub role: RequestedRole,
}

pub async fn execute(
    services: &Services,
    session_id: &SessionId,
    cmd: RequestJoinCommand,
) -> Result<JoinRequestView, AppError> {
    services.live_session(session_id).await?;

    let now = services.now();
    let request = services
        .registry
        .update(session_id, |s| s.add_join_request(cmd.role, now))
        .await
        .ok_or(AppError::NotFound("session"))?;

    let view = JoinRequestView::from(&request);
    services.join_feed.open(session_id, view.clone());
    info!("join request {} ({:?}) for session {}", request.id, cmd.role, session_id);
    Ok(view)
}
