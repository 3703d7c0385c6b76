use chrono::{DateTime, Duration, Utc};
use huddle_protocol::QuotaSnapshot;
use std::collections::HashMap;

use crate::domain::error::DomainError;
use crate::domain::value_objects::{
    ClientIdentity, JoinRequestId, RequestedRole, SessionId, SessionKind,
};

use super::join_request::JoinRequest;

pub const MAX_SCOPE_LEN: usize = 1_000;
pub const MAX_CONTEXT_LEN: usize = 4_000;

/// Server-side record of a time-boxed collaboration instance.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionKind,
    scope: Option<String>,
    context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: u32,
    usage: HashMap<ClientIdentity, u32>,
    join_requests: HashMap<JoinRequestId, JoinRequest>,
}

impl Session {
    /// Blank or whitespace-only scope/context count as absent.
    pub fn new(
        kind: SessionKind,
        scope: Option<String>,
        context: Option<String>,
        usage_limit: u32,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, DomainError> {
        if ttl <= Duration::zero() {
            return Err(DomainError::InvalidLifetime);
        }
        let scope = normalize(scope);
        let context = normalize(context);

        match kind {
            SessionKind::Moderated if scope.is_none() => return Err(DomainError::MissingScope),
            SessionKind::Plain if scope.is_some() || context.is_some() => {
                return Err(DomainError::UnexpectedScope)
            }
            _ => {}
        }
        check_len("scope", scope.as_deref(), MAX_SCOPE_LEN)?;
        check_len("context", context.as_deref(), MAX_CONTEXT_LEN)?;

        Ok(Self {
            id: SessionId::generate(),
            kind,
            scope,
            context,
            created_at: now,
            expires_at: now + ttl,
            usage_limit,
            usage: HashMap::new(),
            join_requests: HashMap::new(),
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// External room name, stable for the lifetime of the session.
    pub fn room_name(&self) -> String {
        format!("huddle-{}", self.id)
    }

    pub fn quota_for(&self, client: &ClientIdentity) -> QuotaSnapshot {
        QuotaSnapshot {
            used: self.usage.get(client).copied().unwrap_or(0),
            limit: self.usage_limit,
        }
    }

    /// Counts one accepted AI-directed message for `client`.
    pub fn record_usage(&mut self, client: &ClientIdentity) -> Result<QuotaSnapshot, DomainError> {
        let limit = self.usage_limit;
        let used = self.usage.entry(client.clone()).or_insert(0);
        if *used >= limit {
            return Err(DomainError::QuotaExhausted { limit });
        }
        *used += 1;
        Ok(QuotaSnapshot { used: *used, limit })
    }

    /// Undoes one `record_usage` for `client`. Never drops below zero.
    pub fn release_usage(&mut self, client: &ClientIdentity) -> QuotaSnapshot {
        if let Some(used) = self.usage.get_mut(client) {
            *used = used.saturating_sub(1);
        }
        self.quota_for(client)
    }

    pub fn add_join_request(&mut self, role: RequestedRole, now: DateTime<Utc>) -> JoinRequest {
        let request = JoinRequest::new(role, now);
        self.join_requests.insert(request.id, request.clone());
        request
    }

    pub fn join_request(&self, id: &JoinRequestId) -> Option<&JoinRequest> {
        self.join_requests.get(id)
    }

    pub fn join_request_mut(&mut self, id: &JoinRequestId) -> Option<&mut JoinRequest> {
        self.join_requests.get_mut(id)
    }

    pub fn join_requests(&self) -> impl Iterator<Item = &JoinRequest> {
        self.join_requests.values()
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_len(field: &'static str, value: Option<&str>, max: usize) -> Result<(), DomainError> {
    match value {
        Some(v) if v.chars().count() > max => Err(DomainError::TooLong { field, max }),
        _ => Ok(()),
    }
}
