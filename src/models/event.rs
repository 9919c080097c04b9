//! Normalized stream event vocabulary delivered to chat transports.

use serde::{Deserialize, Serialize};

/// One unit of bridge output, in the shape the chat UI understands.
///
/// Serialized with a `type` tag, e.g. `{"type":"assistant","content":"hi"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Echo of the message the user sent.
    User {
        /// Message text.
        content: String,
    },
    /// Complete assistant message text.
    Assistant {
        /// Text segments joined with newlines.
        content: String,
    },
    /// Incremental assistant text fragment.
    AssistantDelta {
        /// Fragment text.
        content: String,
    },
    /// Terminal summary of one agent run.
    Result {
        /// Termination subtype reported by the agent (e.g. `success`, `end_turn`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
        /// Accumulated cost in USD, when reported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cost: Option<f64>,
        /// Number of agent turns, when reported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turns: Option<u64>,
    },
    /// Any failure surfaced to the client.
    Error {
        /// Human-readable failure description.
        content: String,
    },
}

impl StreamEvent {
    /// Build an [`StreamEvent::Error`] from any displayable message.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    /// Event name, identical to the serialized `type` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::AssistantDelta { .. } => "assistant_delta",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends an agent run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. })
    }
}
