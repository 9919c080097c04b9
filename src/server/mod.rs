//! HTTP front for the bridge.
//!
//! - `GET /health` answers a static liveness document.
//! - `POST /agent/query` runs one query on a fresh session and streams every
//!   event as an SSE `data:` frame, ending with `data: [DONE]`.
//!
//! The frames are exactly what [`crate::bridge::http::HttpTransport`]
//! consumes, so one bridge can front another.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::bridge::AgentTransport;
use crate::models::event::StreamEvent;
use crate::models::session::Session;
use crate::stream::sse::DONE_MARKER;
use crate::{AppError, Result};

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "agent-bridge";

/// Shared state of the HTTP front.
pub struct ServerState {
    transport: Arc<dyn AgentTransport>,
}

impl ServerState {
    /// Serve queries through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self { transport }
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    message: String,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": SERVICE_NAME }))
}

async fn agent_query(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Message is required" })),
        )
            .into_response();
    }

    let session = Session::new(Uuid::new_v4().to_string());
    let span = info_span!("http_query", session_id = session.id());
    let (tx, rx) = mpsc::unbounded_channel::<StreamEvent>();
    let transport = Arc::clone(&state.transport);

    tokio::spawn(
        async move {
            let outcome = transport.query(&session, &request.message, &tx).await;
            debug!(?outcome, transport = transport.name(), "query finished");
            session.close();
        }
        .instrument(span),
    );

    Sse::new(event_frames(rx)).into_response()
}

/// Turn the event channel into SSE frames terminated by `[DONE]`.
fn event_frames(
    rx: mpsc::UnboundedReceiver<StreamEvent>,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
    .map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|err| {
            serde_json::to_string(&StreamEvent::error(format!("Error: {err}")))
                .unwrap_or_default()
        });
        Ok(Event::default().data(data))
    });

    events.chain(stream::once(async { Ok(Event::default().data(DONE_MARKER)) }))
}

/// Build the router over `state`.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agent/query", post(agent_query))
        .with_state(state)
}

/// Bind `addr` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener cannot be bound or the server
/// fails.
pub async fn serve(state: Arc<ServerState>, addr: SocketAddr, ct: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {addr}: {err}")))?;
    serve_on(listener, state, ct).await
}

/// Serve on an already bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails.
pub async fn serve_on(listener: TcpListener, state: Arc<ServerState>, ct: CancellationToken) -> Result<()> {
    let bind = listener
        .local_addr()
        .map_err(|err| AppError::Config(format!("listener has no address: {err}")))?;
    info!(%bind, "starting agent bridge HTTP server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("HTTP server error: {err}")))?;

    info!("agent bridge HTTP server shut down");
    Ok(())
}
