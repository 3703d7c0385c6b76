use serde::{Deserialize, Serialize};

/// Plain sessions only gate the room; moderated sessions also unlock the
/// scope-guarded AI participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Plain,
    Moderated,
}

impl SessionKind {
    pub fn allows_ai(&self) -> bool {
        matches!(self, SessionKind::Moderated)
    }
}
