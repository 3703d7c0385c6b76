use huddle_protocol::QuotaSnapshot;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::application::error::AppError;
use crate::domain::{CapabilityRole, ClientIdentity, SessionId};

use super::RelayContext;

/// Connection parameters presented on the relay endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayParams {
    pub role: Option<String>,
    pub token: Option<String>,
}

/// Why a relay connection was refused before the upgrade.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RelayRejection {
    #[error("realtime AI is not configured")]
    Misconfigured,

    #[error("missing or invalid AI capability")]
    Unauthorized,

    #[error("session is not available")]
    SessionUnavailable,

    #[error("AI is only available in moderated sessions")]
    ForbiddenKind,

    #[error("role may not use the AI")]
    ForbiddenRole,

    #[error("usage limit reached")]
    QuotaExhausted,
}

/// An authorized connection, ready to bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub session_id: SessionId,
    pub client: ClientIdentity,
    pub quota: QuotaSnapshot,
}

pub async fn authorize(
    ctx: &RelayContext,
    session_id: &SessionId,
    params: &RelayParams,
) -> Result<Admission, RelayRejection> {
    if ctx.upstream.is_none() {
        return Err(RelayRejection::Misconfigured);
    }

    let services = &ctx.services;
    let grant = params
        .token
        .as_deref()
        .and_then(|token| services.authz.verify_ai_capability(token, session_id))
        .ok_or(RelayRejection::Unauthorized)?;

    let session = match services.live_session(session_id).await {
        Ok(session) => session,
        Err(AppError::NotFound(_)) | Err(AppError::Gone) => return Err(RelayRejection::SessionUnavailable),
        Err(e) => {
            debug!("relay admission lookup failed: {}", e);
            return Err(RelayRejection::SessionUnavailable);
        }
    };
    if !session.kind.allows_ai() {
        return Err(RelayRejection::ForbiddenKind);
    }

    let role = params
        .role
        .as_deref()
        .and_then(|r| r.parse::<CapabilityRole>().ok())
        .ok_or(RelayRejection::ForbiddenRole)?;
    if role != grant.role {
        return Err(RelayRejection::Unauthorized);
    }

    let client = ClientIdentity {
        role,
        subject: grant.subject,
    };
    let quota = session.quota_for(&client);
    if quota.is_exhausted() {
        return Err(RelayRejection::QuotaExhausted);
    }

    Ok(Admission {
        session_id: session.id,
        client,
        quota,
    })
}
