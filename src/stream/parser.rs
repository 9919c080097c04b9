//! Stream event parser.
//!
//! Classifies one line of agent output into a [`StreamEvent`] or an explicit
//! [`Ignored`] outcome. Decoding is a closed set of tagged envelopes; any
//! unknown kind or malformed shape maps to "ignored" plus a log entry and
//! never aborts the stream.
//!
//! # Recognized envelopes
//!
//! | `type`            | Outcome                                              |
//! |-------------------|------------------------------------------------------|
//! | `system`          | Ignored; `init` logs which tool servers connected    |
//! | `assistant`       | [`StreamEvent::Assistant`] with text blocks joined   |
//! | `stream_event`    | [`StreamEvent::AssistantDelta`] for `text_delta`s    |
//! | `result`          | [`StreamEvent::Result`]                              |
//! | *(any other)*     | Ignored; logged at `DEBUG`                           |
//!
//! Only raw agent envelopes are recognized here. Frames that already use the
//! bridge vocabulary are decoded by the HTTP transport itself, so an agent
//! printing `{"type":"error",..}` on stdout never reaches the client.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::event::StreamEvent;
use crate::util::truncate_text;

/// Bytes of an undecodable line kept in diagnostics.
const MALFORMED_PREVIEW_BYTES: usize = 100;

/// Bytes of a structurally unexpected line kept in diagnostics.
const UNEXPECTED_PREVIEW_BYTES: usize = 200;

/// Why a line produced no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ignored {
    /// Empty or whitespace-only line.
    Blank,
    /// Not valid JSON.
    Malformed,
    /// Valid JSON whose fields do not match the declared kind.
    Unexpected,
    /// Diagnostic-only envelope such as `system`.
    Diagnostic,
    /// Assistant message without any text content.
    NoText,
    /// Unknown envelope kind, carrying the `type` tag when there was one.
    Unrecognized(Option<String>),
}

/// Classification result for a single line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Deliver this event to the sink.
    Event(StreamEvent),
    /// Drop the line.
    Ignored(Ignored),
}

impl LineOutcome {
    /// The event, if the line produced one.
    #[must_use]
    pub fn into_event(self) -> Option<StreamEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Ignored(_) => None,
        }
    }
}

// ── Envelope types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    System {
        subtype: Option<String>,
        #[serde(default)]
        mcp_servers: Vec<ServerStatus>,
    },
    Assistant {
        message: Option<AssistantMessage>,
    },
    StreamEvent {
        event: PartialEvent,
    },
    // Agents send `subtype`/`total_cost_usd`/`num_turns`; agent services that
    // relay results use `stop_reason`/`cost`/`turns`. Both may be present.
    Result {
        subtype: Option<String>,
        stop_reason: Option<String>,
        total_cost_usd: Option<f64>,
        cost: Option<f64>,
        num_turns: Option<u64>,
        turns: Option<u64>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ServerStatus {
    name: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PartialEvent {
    ContentBlockDelta {
        delta: Delta,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse one output line into an event, or `None` when the line is dropped.
#[must_use]
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    classify_line(line).into_event()
}

/// Classify one output line.
#[must_use]
pub fn classify_line(line: &str) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Ignored(Ignored::Blank);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => classify_value(value),
        Err(err) => {
            warn!(
                error = %err,
                line = %truncate_text(trimmed, MALFORMED_PREVIEW_BYTES),
                "stream parser: undecodable line, skipping"
            );
            LineOutcome::Ignored(Ignored::Malformed)
        }
    }
}

/// Classify an already-decoded JSON envelope.
#[must_use]
pub fn classify_value(value: Value) -> LineOutcome {
    let kind = value.get("type").and_then(Value::as_str).map(str::to_owned);

    let envelope = match Envelope::deserialize(&value) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(
                kind = kind.as_deref().unwrap_or("<none>"),
                error = %err,
                line = %truncate_text(&value.to_string(), UNEXPECTED_PREVIEW_BYTES),
                "stream parser: unexpected envelope shape, skipping"
            );
            return LineOutcome::Ignored(Ignored::Unexpected);
        }
    };

    match envelope {
        Envelope::System {
            subtype,
            mcp_servers,
        } => {
            log_system(subtype.as_deref(), &mcp_servers);
            LineOutcome::Ignored(Ignored::Diagnostic)
        }
        Envelope::Assistant { message } => assistant_event(message),
        Envelope::StreamEvent { event } => match event {
            PartialEvent::ContentBlockDelta {
                delta: Delta::TextDelta { text },
            } => LineOutcome::Event(StreamEvent::AssistantDelta { content: text }),
            PartialEvent::ContentBlockDelta { .. } | PartialEvent::Other => {
                LineOutcome::Ignored(Ignored::Diagnostic)
            }
        },
        Envelope::Result {
            subtype,
            stop_reason,
            total_cost_usd,
            cost,
            num_turns,
            turns,
        } => LineOutcome::Event(StreamEvent::Result {
            stop_reason: subtype.or(stop_reason),
            cost: total_cost_usd.or(cost),
            turns: num_turns.or(turns),
        }),
        Envelope::Unknown => {
            debug!(
                kind = kind.as_deref().unwrap_or("<none>"),
                "stream parser: unknown envelope kind"
            );
            LineOutcome::Ignored(Ignored::Unrecognized(kind))
        }
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn assistant_event(message: Option<AssistantMessage>) -> LineOutcome {
    let text = message
        .map(|message| {
            message
                .content
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text),
                    ContentBlock::Other => None,
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        LineOutcome::Ignored(Ignored::NoText)
    } else {
        LineOutcome::Event(StreamEvent::Assistant { content: text })
    }
}

fn log_system(subtype: Option<&str>, servers: &[ServerStatus]) {
    info!(subtype = subtype.unwrap_or("<none>"), "agent system event");

    if subtype == Some("init") {
        let connected: Vec<&str> = servers
            .iter()
            .filter(|server| server.status == "connected")
            .map(|server| server.name.as_str())
            .collect();
        info!(
            connected = %connected.join(", "),
            total = servers.len(),
            "tool servers reported by agent"
        );
    }
}
