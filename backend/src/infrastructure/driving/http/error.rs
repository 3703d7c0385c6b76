use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::application::error::AppError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Gone => StatusCode::GONE,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Upstream(detail) => {
                warn!("upstream failure: {}", detail);
                "upstream service failed".to_string()
            }
            AppError::Internal(detail) => {
                error!("internal error: {}", detail);
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(body(AppError::Gone).await.0, StatusCode::GONE);
        assert_eq!(body(AppError::Conflict("decided".into())).await.0, StatusCode::CONFLICT);
        assert_eq!(body(AppError::RateLimited).await.0, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body(AppError::Configuration("room service")).await,
            (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({"error": "room service is not configured"})
            )
        );
    }

    #[tokio::test]
    async fn test_upstream_detail_is_hidden() {
        let (status, json) = body(AppError::Upstream("room service returned 401: bad key sk-123".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"], "upstream service failed");
    }
}
