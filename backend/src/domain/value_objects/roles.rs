use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles that can hold a capability token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityRole {
    Host,
    Participant,
}

impl CapabilityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityRole::Host => "host",
            CapabilityRole::Participant => "participant",
        }
    }
}

impl FromStr for CapabilityRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(CapabilityRole::Host),
            "participant" => Ok(CapabilityRole::Participant),
            _ => Err(()),
        }
    }
}

impl fmt::Display for CapabilityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a guest asks for when requesting to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedRole {
    Participant,
    Observer,
}

impl RequestedRole {
    /// Observers join the room muted and never reach the AI relay.
    pub fn capability(&self) -> Option<CapabilityRole> {
        match self {
            RequestedRole::Participant => Some(CapabilityRole::Participant),
            RequestedRole::Observer => None,
        }
    }
}
