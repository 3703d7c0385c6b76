use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::error::AppError;
use crate::application::services::Services;
use crate::domain::{SessionId, SessionKind};

#[derive(Debug, Deserialize)]
pub struct CreateSessionCommand {
    pub kind: SessionKind,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResult {
    pub id: SessionId,
    pub kind: SessionKind,
    pub expires_at: DateTime<Utc>,
    pub host_capability: String,
}

pub async fn execute(services: &Services, cmd: CreateSessionCommand) -> Result<CreateSessionResult, AppError> {
    let session = services
        .registry
        .create(
            cmd.kind,
            cmd.scope,
            cmd.context,
            services.policy.usage_limit,
            services.policy.ttl,
        )
        .await?;
    let host_capability = services
        .authz
        .issue_host_capability(&session.id, session.expires_at)?;

    info!("created {:?} session {} (expires {})", session.kind, session.id, session.expires_at);

    Ok(CreateSessionResult {
        id: session.id,
        kind: session.kind,
        expires_at: session.expires_at,
        host_capability,
    })
}
