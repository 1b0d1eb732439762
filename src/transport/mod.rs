//! Transport layer implementations for MCP protocol
//!
//! Supports two transport methods:
//! - stdio: newline-delimited JSON-RPC on stdin/stdout for local MCP clients
//! - sse: HTTP with a server-sent event stream per session for remote access

pub mod sse;
pub mod stdio;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use sse::SseTransport;
pub use stdio::StdioTransport;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC request id, echoed back on the response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

/// JSON-RPC 2.0 message wrapper for proper serialization
///
/// Variant order matters: a request carries both `id` and `method`, a
/// notification only `method`, a response only `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request {
        jsonrpc: String,
        id: RequestId,
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    Notification {
        jsonrpc: String,
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    Response {
        jsonrpc: String,
        id: Option<RequestId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<McpError>,
    },
}

/// MCP message types (internal representation)
#[derive(Debug, Clone)]
pub enum McpMessage {
    Initialize {
        id: RequestId,
        params: InitializeParams,
    },
    Ping {
        id: RequestId,
    },
    ToolsList {
        id: RequestId,
    },
    ToolsCall {
        id: RequestId,
        params: ToolsCallParams,
    },
    ResourcesList {
        id: RequestId,
    },
    ResourcesRead {
        id: RequestId,
        params: ResourcesReadParams,
    },
    PromptsList {
        id: RequestId,
    },
    PromptsGet {
        id: RequestId,
        params: PromptsGetParams,
    },
    /// A request for a method this server does not implement
    Unsupported {
        id: RequestId,
        method: String,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: Option<RequestId>,
        result: Option<Value>,
        error: Option<McpError>,
    },
}

/// Initialize parameters
///
/// Every field is optional so that older and newer clients can connect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: Option<String>,
    pub capabilities: Value,
    pub client_info: Option<ClientInfo>,
}

/// Client info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Tool call parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Resource read parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesReadParams {
    pub uri: String,
}

/// Prompt get parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsGetParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

/// MCP error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

/// Inbound message that cannot be turned into an [`McpMessage`]
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid params for {method}: {source}")]
    InvalidParams {
        id: RequestId,
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    /// Error response to send back to the peer
    pub fn to_response(&self) -> McpMessage {
        let (id, code) = match self {
            ProtocolError::Parse(_) => (None, PARSE_ERROR),
            ProtocolError::InvalidParams { id, .. } => (Some(id.clone()), INVALID_PARAMS),
        };
        McpMessage::error(id, McpError::new(code, self.to_string()))
    }
}

impl McpMessage {
    /// Successful response for request `id`
    pub fn result(id: RequestId, result: Value) -> Self {
        McpMessage::Response {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Error response for request `id`
    pub fn error(id: Option<RequestId>, error: McpError) -> Self {
        McpMessage::Response {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Parse one line or body of JSON-RPC text.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let message: JsonRpcMessage = serde_json::from_str(text)?;
        Self::from_jsonrpc(message)
    }

    /// Convert MCP message to JSON-RPC message for serialization
    pub fn to_jsonrpc(&self) -> JsonRpcMessage {
        let request = |id: &RequestId, method: &str, params: Option<Value>| JsonRpcMessage::Request {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.clone(),
            method: method.to_string(),
            params,
        };

        match self {
            McpMessage::Initialize { id, params } => request(id, "initialize", to_params(params)),
            McpMessage::Ping { id } => request(id, "ping", None),
            McpMessage::ToolsList { id } => request(id, "tools/list", None),
            McpMessage::ToolsCall { id, params } => request(id, "tools/call", to_params(params)),
            McpMessage::ResourcesList { id } => request(id, "resources/list", None),
            McpMessage::ResourcesRead { id, params } => {
                request(id, "resources/read", to_params(params))
            }
            McpMessage::PromptsList { id } => request(id, "prompts/list", None),
            McpMessage::PromptsGet { id, params } => request(id, "prompts/get", to_params(params)),
            McpMessage::Unsupported { id, method } => request(id, method, None),
            McpMessage::Notification { method, params } => JsonRpcMessage::Notification {
                jsonrpc: JSONRPC_VERSION.to_string(),
                method: method.clone(),
                params: params.clone(),
            },
            McpMessage::Response { id, result, error } => JsonRpcMessage::Response {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: id.clone(),
                result: result.clone(),
                error: error.clone(),
            },
        }
    }

    /// Convert JSON-RPC message to MCP message
    pub fn from_jsonrpc(jsonrpc: JsonRpcMessage) -> Result<Self, ProtocolError> {
        match jsonrpc {
            JsonRpcMessage::Request {
                id, method, params, ..
            } => {
                let message = match method.as_str() {
                    "initialize" => McpMessage::Initialize {
                        params: parse_params(&id, &method, params)?,
                        id,
                    },
                    "ping" => McpMessage::Ping { id },
                    "tools/list" => McpMessage::ToolsList { id },
                    "tools/call" => McpMessage::ToolsCall {
                        params: parse_params(&id, &method, params)?,
                        id,
                    },
                    "resources/list" => McpMessage::ResourcesList { id },
                    "resources/read" => McpMessage::ResourcesRead {
                        params: parse_params(&id, &method, params)?,
                        id,
                    },
                    "prompts/list" => McpMessage::PromptsList { id },
                    "prompts/get" => McpMessage::PromptsGet {
                        params: parse_params(&id, &method, params)?,
                        id,
                    },
                    _ => McpMessage::Unsupported { id, method },
                };
                Ok(message)
            }
            JsonRpcMessage::Notification { method, params, .. } => {
                Ok(McpMessage::Notification { method, params })
            }
            JsonRpcMessage::Response {
                id, result, error, ..
            } => Ok(McpMessage::Response { id, result, error }),
        }
    }

    /// Serialize as one line of JSON-RPC text.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_jsonrpc())
    }
}

/// Missing or null params count as `{}`.
fn parse_params<T: DeserializeOwned>(
    id: &RequestId,
    method: &str,
    params: Option<Value>,
) -> Result<T, ProtocolError> {
    let params = match params {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(params) => params,
    };
    serde_json::from_value(params).map_err(|source| ProtocolError::InvalidParams {
        id: id.clone(),
        method: method.to_string(),
        source,
    })
}

fn to_params<T: Serialize>(params: &T) -> Option<Value> {
    serde_json::to_value(params).ok()
}

/// Message handler trait for processing incoming MCP messages
#[async_trait]
pub trait MessageHandler {
    /// Handle an incoming MCP message
    async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>>;
}

/// Trait for all transport implementations
#[async_trait]
pub trait Transport {
    /// Start the transport and serve until the peer goes away or shutdown is requested
    async fn start(&self, handler: Arc<dyn MessageHandler + Send + Sync>) -> Result<()>;

    /// Stop the transport gracefully
    async fn shutdown(&self) -> Result<()>;
}
