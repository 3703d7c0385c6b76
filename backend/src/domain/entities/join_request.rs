use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::DomainError;
use crate::domain::value_objects::{JoinRequestId, RequestedRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStatus {
    Pending,
    Admitted,
    Denied,
}

impl JoinStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JoinStatus::Pending)
    }
}

impl fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinStatus::Pending => "pending",
            JoinStatus::Admitted => "admitted",
            JoinStatus::Denied => "denied",
        };
        f.write_str(s)
    }
}

/// Room access handed out on admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomGrant {
    pub room_url: String,
    pub room_token: String,
    pub final_role: RequestedRole,
}

/// A guest's ask to enter a session, decided exactly once by the host.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub id: JoinRequestId,
    pub requested_role: RequestedRole,
    status: JoinStatus,
    pub created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    grant: Option<RoomGrant>,
}

impl JoinRequest {
    pub fn new(requested_role: RequestedRole, now: DateTime<Utc>) -> Self {
        Self {
            id: JoinRequestId::generate(),
            requested_role,
            status: JoinStatus::Pending,
            created_at: now,
            decided_at: None,
            grant: None,
        }
    }

    pub fn status(&self) -> JoinStatus {
        self.status
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn grant(&self) -> Option<&RoomGrant> {
        self.grant.as_ref()
    }

    /// Role the guest ended up with, once admitted.
    pub fn admitted_role(&self) -> Option<RequestedRole> {
        self.grant.as_ref().map(|g| g.final_role)
    }

    pub fn admit(&mut self, grant: RoomGrant, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = JoinStatus::Admitted;
        self.decided_at = Some(now);
        self.grant = Some(grant);
        Ok(())
    }

    pub fn deny(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = JoinStatus::Denied;
        self.decided_at = Some(now);
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::AlreadyDecided(self.status));
        }
        Ok(())
    }
}
