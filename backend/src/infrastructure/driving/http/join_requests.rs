use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{Stream, StreamExt};
use std::time::Duration;

use crate::application::error::AppError;
use crate::application::guest::commands::join_request_status;
use crate::application::guest::commands::request_join::{self, RequestJoinCommand};
use crate::application::host::commands::{decide_join_request, list_join_requests};
use crate::application::join_feed::JoinRequestView;
use crate::domain::{JoinRequestId, SessionId};
use crate::infrastructure::driving::http::middleware::auth::HostCapability;
use crate::infrastructure::AppState;

fn ids(session: String, request: &str) -> Result<(SessionId, JoinRequestId), AppError> {
    let request = JoinRequestId::parse(request).ok_or(AppError::NotFound("join request"))?;
    Ok((SessionId::from_string(session), request))
}

/// POST /api/sessions/:id/join-requests
pub async fn create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(cmd): Json<RequestJoinCommand>,
) -> Result<(StatusCode, Json<JoinRequestView>), AppError> {
    let id = SessionId::from_string(id);
    let view = request_join::execute(&state.services, &id, cmd).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/sessions/:id/join-requests
pub async fn list(
    State(state): State<AppState>,
    capability: HostCapability,
    Path(id): Path<String>,
) -> Result<Json<Vec<JoinRequestView>>, AppError> {
    let id = SessionId::from_string(id);
    Ok(Json(
        list_join_requests::execute(&state.services, &id, capability.token()).await?,
    ))
}

/// GET /api/sessions/:id/join-requests/:rid
pub async fn status(
    State(state): State<AppState>,
    Path((id, rid)): Path<(String, String)>,
) -> Result<Json<JoinRequestView>, AppError> {
    let (id, rid) = ids(id, &rid)?;
    Ok(Json(join_request_status::execute(&state.services, &id, &rid).await?))
}

/// GET /api/sessions/:id/join-requests/:rid/events
///
/// One `status` event per change; the stream ends once the request is
/// decided or the session is retired.
pub async fn events(
    State(state): State<AppState>,
    Path((id, rid)): Path<(String, String)>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let (id, rid) = ids(id, &rid)?;
    let updates = join_request_status::subscribe(&state.services, &id, &rid).await?;
    let stream = updates.map(|view| Event::default().event("status").json_data(view));
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive")))
}

/// POST /api/sessions/:id/join-requests/:rid/admit
pub async fn admit(
    State(state): State<AppState>,
    capability: HostCapability,
    Path((id, rid)): Path<(String, String)>,
) -> Result<Json<JoinRequestView>, AppError> {
    let (id, rid) = ids(id, &rid)?;
    Ok(Json(
        decide_join_request::admit(&state.services, &id, &rid, capability.token()).await?,
    ))
}

/// POST /api/sessions/:id/join-requests/:rid/deny
pub async fn deny(
    State(state): State<AppState>,
    capability: HostCapability,
    Path((id, rid)): Path<(String, String)>,
) -> Result<Json<JoinRequestView>, AppError> {
    let (id, rid) = ids(id, &rid)?;
    Ok(Json(
        decide_join_request::deny(&state.services, &id, &rid, capability.token()).await?,
    ))
}
