use crate::application::error::AppError;
use crate::application::join_feed::JoinRequestView;
use crate::application::services::Services;
use crate::domain::SessionId;

/// Join requests of a session, oldest first.
pub async fn execute(
    services: &Services,
    session_id: &SessionId,
    host_token: Option<&str>,
) -> Result<Vec<JoinRequestView>, AppError> {
    let session = services.live_session(session_id).await?;
    services.require_host(host_token, session_id)?;

    let mut views: Vec<JoinRequestView> = session.join_requests().map(JoinRequestView::from).collect();
    views.sort_by_key(|v| v.created_at);
    Ok(views)
}
