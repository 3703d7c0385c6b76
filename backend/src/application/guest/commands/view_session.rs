use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::error::AppError;
use crate::application::services::Services;
use crate::domain::{SessionId, SessionKind};

/// Public metadata of a live session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: SessionId,
    pub kind: SessionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub expires_at: DateTime<Utc>,
}

pub async fn execute(services: &Services, session_id: &SessionId) -> Result<SessionView, AppError> {
    let session = services.live_session(session_id).await?;
    Ok(SessionView {
        scope: session.scope().map(str::to_string),
        context: session.context().map(str::to_string),
        id: session.id,
        kind: session.kind,
        expires_at: session.expires_at,
    })
}
