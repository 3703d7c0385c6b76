use chrono::{DateTime, Utc};
use huddle_protocol::QuotaSnapshot;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::error::AppError;
use crate::application::services::Services;
use crate::domain::{CapabilityRole, ClientIdentity, JoinRequestId, JoinStatus, RequestedRole, SessionId};

/// Role claimed by the caller. Observers may ask, but are always refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiatedRole {
    Host,
    Participant,
    Observer,
}

#[derive(Debug, Deserialize)]
pub struct NegotiateAccessCommand {
    pub role: NegotiatedRole,
    #[serde(default)]
    pub request_id: Option<JoinRequestId>,
}

#[derive(Debug, Serialize)]
pub struct AiAccess {
    pub relay_path: String,
    pub ai_capability: String,
    pub role: CapabilityRole,
    pub quota: QuotaSnapshot,
    pub expires_at: DateTime<Utc>,
}

/// Exchanges proof of role for a short-lived AI capability.
///
/// Hosts prove themselves with the host capability; participants with the id
/// of a join request that was admitted as participant.
pub async fn execute(
    services: &Services,
    session_id: &SessionId,
    cmd: NegotiateAccessCommand,
    host_token: Option<&str>,
) -> Result<AiAccess, AppError> {
    let session = services.live_session(session_id).await?;
    if !session.kind.allows_ai() {
        return Err(AppError::Forbidden("AI is only available in moderated sessions"));
    }

    let client = match cmd.role {
        NegotiatedRole::Host => {
            services.require_host(host_token, session_id)?;
            ClientIdentity::host()
        }
        NegotiatedRole::Participant => {
            let request_id = cmd
                .request_id
                .ok_or_else(|| AppError::Validation("request_id is required for participants".to_string()))?;
            let request = session
                .join_request(&request_id)
                .ok_or(AppError::NotFound("join request"))?;
            if request.status() != JoinStatus::Admitted
                || request.admitted_role() != Some(RequestedRole::Participant)
            {
                return Err(AppError::Forbidden("join request is not an admitted participant"));
            }
            ClientIdentity::participant(&request_id)
        }
        NegotiatedRole::Observer => return Err(AppError::Forbidden("observers cannot use the AI")),
    };

    let quota = session.quota_for(&client);
    if quota.is_exhausted() {
        return Err(AppError::RateLimited);
    }

    let expires_at = (services.now() + services.policy.ai_capability_ttl).min(session.expires_at);
    let ai_capability = services
        .authz
        .issue_ai_capability(session_id, client.role, &client.subject, expires_at)?;

    info!("issued AI capability to {} on session {}", client, session_id);
    Ok(AiAccess {
        relay_path: format!("/api/sessions/{}/ai/relay", session_id),
        ai_capability,
        role: client.role,
        quota,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::host::commands::create_session::{self, CreateSessionCommand};
    use crate::application::ports::Clock;
    use crate::domain::SessionKind;
    use crate::testutil::TestServices;
    use chrono::Duration;

    fn host_cmd() -> NegotiateAccessCommand {
        NegotiateAccessCommand {
            role: NegotiatedRole::Host,
            request_id: None,
        }
    }

    #[tokio::test]
    async fn test_host_gets_capability_bound_to_session() {
        let t = TestServices::new();
        let (session, host) = t.moderated_session().await;

        let access = execute(&t.services, &session, host_cmd(), Some(&host)).await.unwrap();
        assert_eq!(access.relay_path, format!("/api/sessions/{}/ai/relay", session));
        assert_eq!(access.quota, QuotaSnapshot { used: 0, limit: t.services.policy.usage_limit });
        assert_eq!(access.expires_at, t.clock.now() + t.services.policy.ai_capability_ttl);

        let grant = t
            .services
            .authz
            .verify_ai_capability(&access.ai_capability, &session)
            .unwrap();
        assert_eq!(grant.role, CapabilityRole::Host);
        assert_eq!(grant.subject, "host");
    }

    #[tokio::test]
    async fn test_capability_never_outlives_session() {
        let t = TestServices::new();
        let (session, host) = t.moderated_session().await;
        t.clock.advance(t.services.policy.ttl - Duration::minutes(1));

        let access = execute(&t.services, &session, host_cmd(), Some(&host)).await.unwrap();
        let stored = t.services.registry.get(&session).await.unwrap();
        assert_eq!(access.expires_at, stored.expires_at);
    }

    #[tokio::test]
    async fn test_plain_session_has_no_ai() {
        let t = TestServices::new();
        let created = create_session::execute(
            &t.services,
            CreateSessionCommand {
                kind: SessionKind::Plain,
                scope: None,
                context: None,
            },
        )
        .await
        .unwrap();
        let result = execute(&t.services, &created.id, host_cmd(), Some(&created.host_capability)).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_participant_needs_admitted_request() {
        let t = TestServices::new();
        let (session, _host) = t.moderated_session().await;
        let request = t.join(&session, RequestedRole::Participant).await;

        let cmd = || NegotiateAccessCommand {
            role: NegotiatedRole::Participant,
            request_id: Some(request),
        };
        assert!(matches!(
            execute(&t.services, &session, cmd(), None).await,
            Err(AppError::Forbidden(_))
        ));

        t.admit_without_room(&session, &request).await;
        let access = execute(&t.services, &session, cmd(), None).await.unwrap();
        let grant = t
            .services
            .authz
            .verify_ai_capability(&access.ai_capability, &session)
            .unwrap();
        assert_eq!(grant.role, CapabilityRole::Participant);
        assert_eq!(grant.subject, request.to_string());
    }

    #[tokio::test]
    async fn test_observers_and_missing_proof_rejected() {
        let t = TestServices::new();
        let (session, _host) = t.moderated_session().await;
        let observer = NegotiateAccessCommand {
            role: NegotiatedRole::Observer,
            request_id: None,
        };
        assert!(matches!(
            execute(&t.services, &session, observer, None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            execute(&t.services, &session, host_cmd(), None).await,
            Err(AppError::Forbidden(_))
        ));
        let no_request = NegotiateAccessCommand {
            role: NegotiatedRole::Participant,
            request_id: None,
        };
        assert!(matches!(
            execute(&t.services, &session, no_request, None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_exhausted_quota_is_rate_limited() {
        let t = TestServices::new();
        let (session, host) = t.moderated_session().await;
        for _ in 0..t.services.policy.usage_limit {
            t.services
                .registry
                .record_usage(&session, &ClientIdentity::host())
                .await
                .unwrap();
        }
        assert!(matches!(
            execute(&t.services, &session, host_cmd(), Some(&host)).await,
            Err(AppError::RateLimited)
        ));
    }
}
