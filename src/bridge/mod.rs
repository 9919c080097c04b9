//! Transport-agnostic agent bridge.
//!
//! The [`AgentTransport`] trait decouples the chat front from how the agent
//! is reached (local subprocess or remote HTTP service). Every transport
//! reports through an [`EventSink`] using the normalized
//! [`StreamEvent`] vocabulary, so the parsing rules in
//! [`crate::stream::parser`] are shared by all of them.

pub mod http;
pub mod subprocess;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::models::event::StreamEvent;
use crate::models::session::Session;

/// Destination for bridge events.
///
/// Called synchronously, zero or more times per query, in delivery order.
pub trait EventSink: Send + Sync {
    /// Hand one event to the transport layer.
    fn deliver(&self, event: StreamEvent);
}

impl EventSink for mpsc::UnboundedSender<StreamEvent> {
    fn deliver(&self, event: StreamEvent) {
        if self.send(event).is_err() {
            debug!("event sink: receiver dropped, discarding event");
        }
    }
}

/// [`EventSink`] backed by a closure.
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(StreamEvent) + Send + Sync,
{
    fn deliver(&self, event: StreamEvent) {
        (self.0)(event);
    }
}

/// What happened to a query handed to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The query ran to completion; failures were reported as `error` events.
    Completed,
    /// The session was busy and the query was dropped without any event.
    Dropped,
}

/// Boxed future returned by [`AgentTransport::query`].
pub type QueryFuture<'a> = Pin<Box<dyn Future<Output = QueryOutcome> + Send + 'a>>;

/// One way of reaching the agent.
pub trait AgentTransport: Send + Sync {
    /// Short transport name for logs.
    fn name(&self) -> &'static str;

    /// Run `message` through the agent for `session`, delivering events to `sink`.
    ///
    /// Implementations enforce single-flight per session via
    /// [`Session::try_begin`]: a query arriving while another is in flight is
    /// dropped with [`QueryOutcome::Dropped`]. Every failure degrades to a
    /// single `error` event; the transport stays usable afterwards.
    fn query<'a>(
        &'a self,
        session: &'a Session,
        message: &'a str,
        sink: &'a dyn EventSink,
    ) -> QueryFuture<'a>;
}

/// Chat front for one conversation.
///
/// Echoes each user message as a `user` event and runs the query on a
/// background task so the caller is never blocked by the agent.
pub struct ChatBridge {
    session: Arc<Session>,
    transport: Arc<dyn AgentTransport>,
    sink: Arc<dyn EventSink>,
}

impl ChatBridge {
    /// Create a chat front over `transport` for `session`.
    #[must_use]
    pub fn new(
        session: Arc<Session>,
        transport: Arc<dyn AgentTransport>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            session,
            transport,
            sink,
        }
    }

    /// The conversation this front serves.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Accept one chat message.
    ///
    /// Blank messages are ignored and return `None`. Otherwise the returned
    /// handle resolves once the query finished; a panic inside the transport
    /// is reported to the sink as one `error` event.
    pub fn chat(&self, message: &str) -> Option<JoinHandle<QueryOutcome>> {
        if message.trim().is_empty() {
            return None;
        }

        self.sink.deliver(StreamEvent::User {
            content: message.to_owned(),
        });

        let session = Arc::clone(&self.session);
        let transport = Arc::clone(&self.transport);
        let sink = Arc::clone(&self.sink);
        let message = message.to_owned();

        Some(tokio::spawn(async move {
            let query = transport.query(&session, &message, sink.as_ref());
            match AssertUnwindSafe(query).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(reason = %reason, "chat worker panicked");
                    sink.deliver(StreamEvent::error(format!("Error: {reason}")));
                    QueryOutcome::Completed
                }
            }
        }))
    }

    /// End the conversation, discarding any lingering descriptor.
    pub fn close(&self) {
        self.session.close();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|reason| (*reason).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "agent task panicked".to_owned())
}
