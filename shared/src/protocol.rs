use serde::{Deserialize, Serialize};

/// Usage of a single client against its session quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub used: u32,
    pub limit: u32,
}

impl QuotaSnapshot {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// Events authored by the relay itself and delivered to the client
/// interleaved with the verbatim upstream traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayEvent {
    /// Upstream connection is open and the session directive has been applied
    #[serde(rename = "relay.upstream_ready")]
    UpstreamReady,
    /// Quota state at bridge start
    #[serde(rename = "relay.quota")]
    Quota {
        #[serde(flatten)]
        quota: QuotaSnapshot,
    },
    /// Quota state after an accepted user message
    #[serde(rename = "relay.quota_update")]
    QuotaUpdate {
        #[serde(flatten)]
        quota: QuotaSnapshot,
    },
    /// Terminal: the connection is closed right after this event
    #[serde(rename = "relay.limit_reached")]
    LimitReached {
        #[serde(flatten)]
        quota: QuotaSnapshot,
    },
    /// A user message was judged out of scope and dropped
    #[serde(rename = "relay.scope_violation")]
    ScopeViolation {
        reason: String,
    },
    /// A client-originated message was rejected (non-fatal)
    #[serde(rename = "error")]
    Error {
        error: ErrorBody,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl RelayEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn to_json(&self) -> String {
        // Every variant is a plain struct of strings and integers.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// WebSocket close codes used by the relay (application range 4000-4999).
pub mod close_codes {
    pub const NORMAL: u16 = 1000;
    pub const INTERNAL: u16 = 1011;
    pub const SESSION_EXPIRED: u16 = 4001;
    pub const SESSION_ENDED: u16 = 4002;
    pub const LIMIT_REACHED: u16 = 4003;
    pub const UPSTREAM_UNAVAILABLE: u16 = 4004;
    pub const BACKLOG_EXCEEDED: u16 = 4005;
}
