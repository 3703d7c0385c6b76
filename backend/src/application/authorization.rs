//! Signed capability tokens binding a session, a role and a subject.
//!
//! Tokens are HS256 JWTs. Host capabilities and AI capabilities use
//! different audiences so one can never be replayed as the other.
//! Verification is fail-closed and callers only ever learn "valid" or
//! "invalid".

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::application::error::AppError;
use crate::application::ports::Clock;
use crate::domain::{CapabilityRole, SessionId, HOST_SUBJECT};

const HOST_AUDIENCE: &str = "huddle:host";
const AI_AUDIENCE: &str = "huddle:relay";

#[derive(Debug, Serialize, Deserialize)]
struct CapabilityClaims {
    sid: String,
    role: String,
    sub: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// What a verified AI capability grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiGrant {
    pub role: CapabilityRole,
    pub subject: String,
}

pub struct AuthorizationService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl AuthorizationService {
    pub fn new(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            clock,
        }
    }

    pub fn issue_host_capability(
        &self,
        session_id: &SessionId,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        self.sign(session_id, CapabilityRole::Host, HOST_SUBJECT, HOST_AUDIENCE, expires_at)
    }

    pub fn verify_host_capability(&self, token: &str, session_id: &SessionId) -> bool {
        self.decode(token, HOST_AUDIENCE, session_id)
            .map(|claims| claims.role == CapabilityRole::Host.as_str() && claims.sub == HOST_SUBJECT)
            .unwrap_or(false)
    }

    pub fn issue_ai_capability(
        &self,
        session_id: &SessionId,
        role: CapabilityRole,
        subject: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        self.sign(session_id, role, subject, AI_AUDIENCE, expires_at)
    }

    pub fn verify_ai_capability(&self, token: &str, session_id: &SessionId) -> Option<AiGrant> {
        let claims = self.decode(token, AI_AUDIENCE, session_id)?;
        let role = claims.role.parse::<CapabilityRole>().ok()?;
        if claims.sub.is_empty() {
            return None;
        }
        Some(AiGrant {
            role,
            subject: claims.sub,
        })
    }

    fn sign(
        &self,
        session_id: &SessionId,
        role: CapabilityRole,
        subject: &str,
        audience: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = CapabilityClaims {
            sid: session_id.to_string(),
            role: role.as_str().to_string(),
            sub: subject.to_string(),
            aud: audience.to_string(),
            iat: self.clock.now().timestamp(),
            exp: expires_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    fn decode(&self, token: &str, audience: &str, session_id: &SessionId) -> Option<CapabilityClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "aud", "sub"]);

        let claims = match decode::<CapabilityClaims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(_) => {
                debug!("rejected capability token");
                return None;
            }
        };
        if claims.sid != session_id.as_str() || claims.exp <= self.clock.now().timestamp() {
            debug!("rejected capability token");
            return None;
        }
        Some(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::clock::ManualClock;
    use chrono::Duration;

    fn service(secret: &[u8]) -> (Arc<ManualClock>, AuthorizationService) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (clock.clone(), AuthorizationService::new(secret, clock))
    }

    #[test]
    fn test_host_capability_round_trip() {
        let (clock, authz) = service(b"secret-one");
        let session = SessionId::generate();
        let token = authz
            .issue_host_capability(&session, clock.now() + Duration::minutes(5))
            .unwrap();

        assert!(authz.verify_host_capability(&token, &session));
        assert!(!authz.verify_host_capability(&token, &SessionId::generate()));
        assert!(!authz.verify_host_capability("not-a-token", &session));
    }

    #[test]
    fn test_capabilities_expire_on_the_injected_clock() {
        let (clock, authz) = service(b"secret-one");
        let session = SessionId::generate();
        let token = authz
            .issue_host_capability(&session, clock.now() + Duration::minutes(5))
            .unwrap();

        clock.advance(Duration::minutes(5));
        assert!(!authz.verify_host_capability(&token, &session));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let (clock, authz) = service(b"secret-one");
        let (_, forger) = service(b"secret-two");
        let session = SessionId::generate();
        let forged = forger
            .issue_ai_capability(&session, CapabilityRole::Host, "host", clock.now() + Duration::minutes(5))
            .unwrap();

        assert!(authz.verify_ai_capability(&forged, &session).is_none());
    }

    #[test]
    fn test_host_and_ai_audiences_do_not_mix() {
        let (clock, authz) = service(b"secret-one");
        let session = SessionId::generate();
        let expires = clock.now() + Duration::minutes(5);
        let host = authz.issue_host_capability(&session, expires).unwrap();
        let ai = authz
            .issue_ai_capability(&session, CapabilityRole::Host, "host", expires)
            .unwrap();

        assert!(authz.verify_ai_capability(&host, &session).is_none());
        assert!(!authz.verify_host_capability(&ai, &session));
    }

    #[test]
    fn test_ai_capability_carries_role_and_subject() {
        let (clock, authz) = service(b"secret-one");
        let session = SessionId::generate();
        let token = authz
            .issue_ai_capability(
                &session,
                CapabilityRole::Participant,
                "0f8e6c1a-5d2b-4c3e-9a7f-1b2c3d4e5f60",
                clock.now() + Duration::minutes(5),
            )
            .unwrap();

        let grant = authz.verify_ai_capability(&token, &session).unwrap();
        assert_eq!(grant.role, CapabilityRole::Participant);
        assert_eq!(grant.subject, "0f8e6c1a-5d2b-4c3e-9a7f-1b2c3d4e5f60");
        assert!(authz.verify_ai_capability(&token, &SessionId::generate()).is_none());
    }

    #[test]
    fn test_empty_subject_is_rejected() {
        let (clock, authz) = service(b"secret-one");
        let session = SessionId::generate();
        let token = authz
            .issue_ai_capability(&session, CapabilityRole::Participant, "", clock.now() + Duration::minutes(5))
            .unwrap();
        assert!(authz.verify_ai_capability(&token, &session).is_none());
    }
}
