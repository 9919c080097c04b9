//! Wire types for the tool responder's line-delimited JSON-RPC protocol.

use serde::Serialize;
use serde_json::{json, Value};

/// Request line was not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Unknown tool name in `tools/call`.
pub const INVALID_PARAMS: i64 = -32602;
/// Failure while executing a known method.
pub const INTERNAL_ERROR: i64 = -32603;

/// Protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = "agent-bridge-schema";
/// The single tool exposed by the responder.
pub const CHECK_SCHEMA_TOOL: &str = "check_schema";

/// Error member of a failed response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RpcError {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Outcome member of a response: exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RpcBody {
    /// Successful result payload.
    Result(Value),
    /// Failure payload.
    Error(RpcError),
}

/// One response line.
///
/// The `id` is echoed verbatim from the request, or `null` when the request
/// carried none or could not be parsed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    /// Echoed request id.
    pub id: Value,
    /// Result or error.
    #[serde(flatten)]
    pub body: RpcBody,
}

impl RpcResponse {
    /// Successful response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            body: RpcBody::Result(result),
        }
    }

    /// Error response.
    #[must_use]
    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            body: RpcBody::Error(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Error code, if this is an error response.
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        match self.body {
            RpcBody::Error(ref err) => Some(err.code),
            RpcBody::Result(_) => None,
        }
    }

    /// Serialise to a single JSON line without the trailing newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            // Only reachable if a result payload cannot be serialised.
            json!({
                "jsonrpc": "2.0",
                "id": Value::Null,
                "error": { "code": INTERNAL_ERROR, "message": format!("Internal error: {err}") }
            })
            .to_string()
        })
    }
}

/// Result payload of `initialize`.
#[must_use]
pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Result payload of `tools/list`.
#[must_use]
pub fn tools_list_result() -> Value {
    json!({
        "tools": [
            {
                "name": CHECK_SCHEMA_TOOL,
                "description": "Check database schema - returns list of tables and count",
                "inputSchema": {
                    "type": "object",
                    "properties": {},
                    "required": []
                }
            }
        ]
    })
}

/// Result payload of a text-only tool call.
#[must_use]
pub fn text_content(text: &str) -> Value {
    json!({ "content": [{ "type": "text", "text": text }] })
}
