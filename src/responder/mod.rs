//! Tool responder: the helper process the agent launches from its tool
//! descriptor.
//!
//! Speaks newline-delimited JSON-RPC 2.0 on stdin/stdout. Exactly one
//! response line is written per non-blank request line, flushed immediately.
//! Nothing else is ever written to stdout; diagnostics go to the tracing
//! subscriber, which the binary points at stderr.
//!
//! A failure handling one request becomes an error response for that
//! request; the loop only ends when stdin closes.

pub mod protocol;
pub mod schema;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::stream::codec::{Frame, LineCodec, MAX_LINE_BYTES};
use crate::util::truncate_text;
use crate::{AppError, Result};

use self::protocol::{
    initialize_result, text_content, tools_list_result, RpcResponse, CHECK_SCHEMA_TOOL,
    INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
};
use self::schema::SchemaSource;

/// Render the `check_schema` text for `tables`.
///
/// `"Tables: a, b\nCount: 2"`; an empty list yields `"Tables: \nCount: 0"`.
#[must_use]
pub fn format_schema(tables: &[String]) -> String {
    format!("Tables: {}\nCount: {}", tables.join(", "), tables.len())
}

/// JSON-RPC dispatcher over a [`SchemaSource`].
#[derive(Debug)]
pub struct ToolResponder<S> {
    source: S,
}

impl<S: SchemaSource> ToolResponder<S> {
    /// Create a responder answering schema questions from `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Handle one raw input line.
    ///
    /// Returns `None` for blank lines, which get no response.
    pub async fn handle_line(&mut self, line: &str) -> Option<RpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_request(value).await,
            Err(err) => {
                warn!(
                    error = %err,
                    preview = %truncate_text(line, 100),
                    "responder: request is not valid JSON"
                );
                RpcResponse::failure(Value::Null, PARSE_ERROR, format!("Parse error: {err}"))
            }
        };
        Some(response)
    }

    /// Dispatch one decoded request.
    pub async fn handle_request(&mut self, request: Value) -> RpcResponse {
        let Value::Object(map) = request else {
            return RpcResponse::failure(
                Value::Null,
                INTERNAL_ERROR,
                "Internal error: request must be a JSON object",
            );
        };

        let id = map.get("id").cloned().unwrap_or(Value::Null);
        let method = map.get("method").and_then(Value::as_str).unwrap_or_default();
        debug!(method, id = %id, "responder: request");

        match method {
            "initialize" => RpcResponse::success(id, initialize_result()),
            "tools/list" => RpcResponse::success(id, tools_list_result()),
            "tools/call" => {
                let name = map
                    .get("params")
                    .and_then(|params| params.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                self.call_tool(id, name).await
            }
            other => RpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        }
    }

    async fn call_tool(&mut self, id: Value, name: &str) -> RpcResponse {
        if name != CHECK_SCHEMA_TOOL {
            return RpcResponse::failure(id, INVALID_PARAMS, format!("Unknown tool: {name}"));
        }

        match self.check_schema().await {
            Ok(text) => RpcResponse::success(id, text_content(&text)),
            Err(err) => {
                warn!(%err, tool = name, "responder: tool failed");
                let detail = match err {
                    AppError::ToolExecution(msg) => msg,
                    other => other.to_string(),
                };
                RpcResponse::failure(id, INTERNAL_ERROR, format!("Tool execution failed: {detail}"))
            }
        }
    }

    async fn check_schema(&mut self) -> Result<String> {
        let tables = async {
            self.source.reconnect().await?;
            self.source.table_names().await
        }
        .await
        .map_err(|err| AppError::ToolExecution(err.to_string()))?;
        Ok(format_schema(&tables))
    }

    /// Serve requests from `input` until it closes, writing responses to `output`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` when reading `input` or writing `output` fails.
    pub async fn serve<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(input, LineCodec::new());

        while let Some(item) = lines.next().await {
            let response = match item? {
                Frame::Line(line) => match self.handle_line(&line).await {
                    Some(response) => response,
                    None => continue,
                },
                Frame::Invalid(bytes) => {
                    warn!(
                        preview = %truncate_text(&String::from_utf8_lossy(&bytes), 100),
                        "responder: request line is not UTF-8"
                    );
                    RpcResponse::failure(Value::Null, PARSE_ERROR, "Parse error: invalid UTF-8")
                }
                Frame::Oversized => {
                    warn!(max_bytes = MAX_LINE_BYTES, "responder: request line too long");
                    RpcResponse::failure(Value::Null, PARSE_ERROR, "Parse error: line too long")
                }
            };

            write_response(&mut output, &response).await?;
        }

        info!("responder: input closed, exiting");
        Ok(())
    }
}

async fn write_response<W>(output: &mut W, response: &RpcResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = response.to_line();
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
