use futures_util::stream::{self, BoxStream, StreamExt};

use crate::application::error::AppError;
use crate::application::join_feed::{status_updates, JoinRequestView};
use crate::application::services::Services;
use crate::domain::{JoinRequestId, SessionId};

pub async fn execute(
    services: &Services,
    session_id: &SessionId,
    request_id: &JoinRequestId,
) -> Result<JoinRequestView, AppError> {
    let session = services.live_session(session_id).await?;
    session
        .join_request(request_id)
        .map(JoinRequestView::from)
        .ok_or(AppError::NotFound("join request"))
}

/// Push variant: the current status, then one item per change until the
/// request is decided or the session goes away.
pub async fn subscribe(
    services: &Services,
    session_id: &SessionId,
    request_id: &JoinRequestId,
) -> Result<BoxStream<'static, JoinRequestView>, AppError> {
    let current = execute(services, session_id, request_id).await?;
    if current.status.is_terminal() {
        return Ok(stream::once(async move { current }).boxed());
    }
    match services.join_feed.subscribe(session_id, request_id) {
        Some(rx) => Ok(status_updates(rx).boxed()),
        // Decided between the read above and the subscription.
        None => {
            let latest = execute(services, session_id, request_id).await?;
            Ok(stream::once(async move { latest }).boxed())
        }
    }
}
