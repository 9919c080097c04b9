//! Remote agent service transport.
//!
//! Posts the chat message to `<base>/agent/query` and reads the response as a
//! Server-Sent Events stream. Each `data:` payload is first offered to the
//! shared [`classify_value`] parser, so raw agent envelopes (including
//! `content_block_delta` partials) are understood; payloads it does not turn
//! into an event are decoded as bridge-vocabulary [`StreamEvent`]s. The
//! stream ends at `data: [DONE]` or when the server closes the response.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info_span, warn, Instrument};

use super::{AgentTransport, EventSink, QueryFuture, QueryOutcome};
use crate::models::event::StreamEvent;
use crate::models::session::Session;
use crate::stream::parser::{classify_value, Ignored, LineOutcome};
use crate::stream::sse::{SseBuffer, DONE_MARKER};
use crate::util::truncate_text;
use crate::{AppError, Result};

/// Transport reaching an agent service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a transport reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Endpoint the message is posted to.
    #[must_use]
    pub fn query_url(&self) -> String {
        format!("{}/agent/query", self.base_url.trim_end_matches('/'))
    }

    /// Run one query to completion; see [`AgentTransport::query`].
    pub async fn invoke(
        &self,
        session: &Session,
        message: &str,
        sink: &dyn EventSink,
    ) -> QueryOutcome {
        let Some(flight) = session.try_begin() else {
            debug!(session_id = session.id(), "session busy, dropping message");
            return QueryOutcome::Dropped;
        };

        let span = info_span!("agent_service_query", session_id = session.id());
        if let Err(err) = self.run(message, sink).instrument(span).await {
            error!(session_id = session.id(), %err, "agent service query failed");
            sink.deliver(StreamEvent::error(err.client_message()));
        }

        drop(flight);
        QueryOutcome::Completed
    }

    async fn run(&self, message: &str, sink: &dyn EventSink) -> Result<()> {
        let url = self.query_url();
        let response = self
            .client
            .post(&url)
            .json(&json!({ "message": message }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Http(format!("agent service error: {status}")));
        }

        let mut body = response.bytes_stream();
        let mut frames = SseBuffer::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for data in frames.push(&chunk) {
                if data == DONE_MARKER {
                    debug!("agent service stream complete");
                    return Ok(());
                }
                if let Some(event) = decode_frame(&data) {
                    sink.deliver(event);
                }
            }
        }

        debug!(pending = frames.pending(), "agent service closed stream");
        Ok(())
    }
}

/// Decode one SSE `data` payload into an event.
///
/// Raw agent envelopes win; a payload the parser leaves unrecognized or
/// text-less is tried as a bridge-vocabulary event. `user` echoes are dropped
/// since the chat front already emitted one.
#[must_use]
pub fn decode_frame(data: &str) -> Option<StreamEvent> {
    let value = match serde_json::from_str::<Value>(data) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                error = %err,
                frame = %truncate_text(data, 100),
                "agent service frame is not JSON, skipping"
            );
            return None;
        }
    };

    match classify_value(value.clone()) {
        LineOutcome::Event(event) => Some(event),
        LineOutcome::Ignored(Ignored::Unrecognized(_) | Ignored::NoText) => {
            match StreamEvent::deserialize(&value) {
                Ok(StreamEvent::User { .. }) => None,
                Ok(event) => Some(event),
                Err(err) => {
                    debug!(error = %err, "agent service frame carries no event");
                    None
                }
            }
        }
        LineOutcome::Ignored(_) => None,
    }
}

impl AgentTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn query<'a>(
        &'a self,
        session: &'a Session,
        message: &'a str,
        sink: &'a dyn EventSink,
    ) -> QueryFuture<'a> {
        Box::pin(self.invoke(session, message, sink))
    }
}
