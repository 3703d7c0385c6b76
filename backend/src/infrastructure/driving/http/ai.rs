use axum::{
    extract::{Path, State},
    Json,
};

use crate::application::ai::commands::negotiate_access::{self, AiAccess, NegotiateAccessCommand};
use crate::application::error::AppError;
use crate::domain::SessionId;
use crate::infrastructure::driving::http::middleware::auth::HostCapability;
use crate::infrastructure::AppState;

/// POST /api/sessions/:id/ai/negotiate
pub async fn negotiate(
    State(state): State<AppState>,
    capability: HostCapability,
    Path(id): Path<String>,
    Json(cmd): Json<NegotiateAccessCommand>,
) -> Result<Json<AiAccess>, AppError> {
    let id = SessionId::from_string(id);
    Ok(Json(
        negotiate_access::execute(&state.services, &id, cmd, capability.token()).await?,
    ))
}
