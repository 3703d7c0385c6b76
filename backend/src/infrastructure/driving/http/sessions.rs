use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::error::AppError;
use crate::application::guest::commands::view_session::{self, SessionView};
use crate::application::host::commands::{
    create_session, end_session, join_as_host, CreateSessionCommand, CreateSessionResult, HostRoomAccess,
};
use crate::domain::SessionId;
use crate::infrastructure::driving::http::middleware::auth::HostCapability;
use crate::infrastructure::AppState;

/// POST /api/sessions
pub async fn create(
    State(state): State<AppState>,
    Json(cmd): Json<CreateSessionCommand>,
) -> Result<(StatusCode, Json<CreateSessionResult>), AppError> {
    let created = create_session::execute(&state.services, cmd).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/sessions/:id
pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let id = SessionId::from_string(id);
    Ok(Json(view_session::execute(&state.services, &id).await?))
}

/// DELETE /api/sessions/:id
pub async fn end(
    State(state): State<AppState>,
    capability: HostCapability,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = SessionId::from_string(id);
    end_session::execute(&state.services, &id, capability.token()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/:id/host/join
pub async fn host_join(
    State(state): State<AppState>,
    capability: HostCapability,
    Path(id): Path<String>,
) -> Result<Json<HostRoomAccess>, AppError> {
    let id = SessionId::from_string(id);
    Ok(Json(
        join_as_host::execute(&state.services, &id, capability.token()).await?,
    ))
}
