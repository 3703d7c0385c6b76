use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::convert::Infallible;

use crate::infrastructure::AppState;

/// Bearer token presented as a host capability, if any.
///
/// Extraction never fails: commands decide whether a capability is required
/// and whether it is valid for the addressed session.
#[derive(Debug, Clone, Default)]
pub struct HostCapability(pub Option<String>);

impl HostCapability {
    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for HostCapability {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok();
        Ok(HostCapability(header.map(|TypedHeader(auth)| auth.token().to_string())))
    }
}
