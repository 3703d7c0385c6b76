pub mod ai;
pub mod error;
pub mod join_requests;
pub mod middleware;
pub mod sessions;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::infrastructure::driving::relay::relay_handler;
use crate::infrastructure::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(sessions::create))
        .route("/api/sessions/:id", get(sessions::view).delete(sessions::end))
        .route("/api/sessions/:id/host/join", post(sessions::host_join))
        .route(
            "/api/sessions/:id/join-requests",
            get(join_requests::list).post(join_requests::create),
        )
        .route("/api/sessions/:id/join-requests/:rid", get(join_requests::status))
        .route("/api/sessions/:id/join-requests/:rid/events", get(join_requests::events))
        .route("/api/sessions/:id/join-requests/:rid/admit", post(join_requests::admit))
        .route("/api/sessions/:id/join-requests/:rid/deny", post(join_requests::deny))
        .route("/api/sessions/:id/ai/negotiate", post(ai::negotiate))
        .route("/api/sessions/:id/ai/relay", get(relay_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{RelayHarness, TestServices};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::Duration;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(h: &RelayHarness) -> Router {
        router(AppState {
            services: h.services().clone(),
            relay: Arc::new(h.ctx.clone()),
        })
    }

    async fn call(app: &Router, method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn create_moderated(app: &Router) -> (String, String) {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/sessions",
            None,
            Some(json!({"kind": "moderated", "scope": "Should we adopt policy X"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (
            body["id"].as_str().unwrap().to_string(),
            body["host_capability"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let h = RelayHarness::new(TestServices::new());
        let (status, body) = call(&app(&h), Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let h = RelayHarness::new(TestServices::new());
        let app = app(&h);
        let (id, host) = create_moderated(&app).await;
        let uri = format!("/api/sessions/{}", id);

        let (status, body) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "moderated");
        assert_eq!(body["scope"], "Should we adopt policy X");

        assert_eq!(call(&app, Method::DELETE, &uri, None, None).await.0, StatusCode::FORBIDDEN);
        assert_eq!(
            call(&app, Method::DELETE, &uri, Some("not-a-token"), None).await.0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(call(&app, Method::DELETE, &uri, Some(&host), None).await.0, StatusCode::NO_CONTENT);
        assert_eq!(call(&app, Method::GET, &uri, None, None).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expired_session_is_gone_then_not_found() {
        let h = RelayHarness::new(TestServices::new());
        let app = app(&h);
        let (id, _) = create_moderated(&app).await;
        h.clock().advance(h.services().policy.ttl + Duration::seconds(1));

        let uri = format!("/api/sessions/{}", id);
        let (status, body) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"], "session has expired");
        assert_eq!(call(&app, Method::GET, &uri, None, None).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_moderated_session_without_scope_is_rejected() {
        let h = RelayHarness::new(TestServices::new());
        let (status, _) = call(
            &app(&h),
            Method::POST,
            "/api/sessions",
            None,
            Some(json!({"kind": "moderated"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_join_request_decisions() {
        let h = RelayHarness::new(TestServices::new());
        let app = app(&h);
        let (id, host) = create_moderated(&app).await;
        let requests = format!("/api/sessions/{}/join-requests", id);

        let (status, body) = call(&app, Method::POST, &requests, None, Some(json!({"role": "participant"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "pending");
        let rid = body["request_id"].as_str().unwrap().to_string();

        assert_eq!(call(&app, Method::GET, &requests, None, None).await.0, StatusCode::FORBIDDEN);
        let (status, listed) = call(&app, Method::GET, &requests, Some(&host), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        // No room service configured.
        let (status, _) = call(&app, Method::POST, &format!("{}/{}/admit", requests, rid), Some(&host), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = call(&app, Method::POST, &format!("{}/{}/deny", requests, rid), Some(&host), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "denied");
        let (status, _) = call(&app, Method::POST, &format!("{}/{}/deny", requests, rid), Some(&host), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(&app, Method::GET, &format!("{}/{}", requests, rid), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "denied");
        assert_eq!(
            call(&app, Method::GET, &format!("{}/not-a-uuid", requests), None, None).await.0,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_status_events_for_decided_request() {
        let h = RelayHarness::new(TestServices::new());
        let app = app(&h);
        let (id, host) = create_moderated(&app).await;
        let requests = format!("/api/sessions/{}/join-requests", id);
        let (_, body) = call(&app, Method::POST, &requests, None, Some(json!({"role": "observer"}))).await;
        let rid = body["request_id"].as_str().unwrap().to_string();
        call(&app, Method::POST, &format!("{}/{}/deny", requests, rid), Some(&host), None).await;

        let req = Request::builder()
            .uri(format!("{}/{}/events", requests, rid))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("event: status"));
        assert!(text.contains("\"status\":\"denied\""));
    }

    #[tokio::test]
    async fn test_negotiate_and_relay_admission() {
        let h = RelayHarness::new(TestServices::new());
        let app = app(&h);
        let (id, host) = create_moderated(&app).await;

        let negotiate = format!("/api/sessions/{}/ai/negotiate", id);
        assert_eq!(
            call(&app, Method::POST, &negotiate, None, Some(json!({"role": "host"}))).await.0,
            StatusCode::FORBIDDEN
        );
        let (status, access) = call(&app, Method::POST, &negotiate, Some(&host), Some(json!({"role": "host"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(access["role"], "host");
        let relay_path = access["relay_path"].as_str().unwrap().to_string();
        let token = access["ai_capability"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Method::GET, &format!("{}?role=host", relay_path), None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("{}?role=participant&token={}", relay_path, token),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        // Authorized, but not a websocket handshake.
        let (status, _) = call(&app, Method::GET, &format!("{}?role=host&token={}", relay_path, token), None, None).await;
        assert_eq!(status, StatusCode::UPGRADE_REQUIRED);
    }

    #[tokio::test]
    async fn test_relay_without_upstream_is_unavailable() {
        let h = RelayHarness::new(TestServices::new());
        let (session, token) = h.host_ai_capability().await;
        let mut ctx = h.ctx.clone();
        ctx.upstream = None;
        let app = router(AppState {
            services: h.services().clone(),
            relay: Arc::new(ctx),
        });

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/api/sessions/{}/ai/relay?role=host&token={}", session, token),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "realtime AI is not configured");
    }
}
