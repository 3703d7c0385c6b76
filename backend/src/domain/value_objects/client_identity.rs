use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CapabilityRole, JoinRequestId};

pub const HOST_SUBJECT: &str = "host";

/// Key of a per-client usage counter inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub role: CapabilityRole,
    pub subject: String,
}

impl ClientIdentity {
    pub fn host() -> Self {
        Self {
            role: CapabilityRole::Host,
            subject: HOST_SUBJECT.to_string(),
        }
    }

    pub fn participant(request_id: &JoinRequestId) -> Self {
        Self {
            role: CapabilityRole::Participant,
            subject: request_id.to_string(),
        }
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.subject)
    }
}
