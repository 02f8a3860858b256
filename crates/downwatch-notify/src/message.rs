//! Status messages produced by a check cycle.

use serde::{Deserialize, Serialize};

/// Why a message was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// The endpoint was down and is reachable again.
    RecoveredFromDown,
    /// The endpoint was down and still is.
    StillDown,
}

/// One line of an owner's report. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub kind: MessageKind,
}

impl StatusMessage {
    pub fn recovered(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: MessageKind::RecoveredFromDown,
        }
    }

    pub fn still_down(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: MessageKind::StillDown,
        }
    }
}

impl std::fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
