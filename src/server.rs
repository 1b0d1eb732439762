//! Core MCP server implementation

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::client::BlazeClient;
use crate::config::ServerConfig;
use crate::prompts::{self, PromptError};
use crate::resources::{self, ResourceError};
use crate::tools::{ToolDescriptor, ToolDispatcher};
use crate::transport::{McpError, McpMessage, MessageHandler, RequestId};

pub const SERVER_NAME: &str = "blaze-mcp";

/// Protocol revisions this server can speak, newest last
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server exposing a Blaze FHIR server as tools, resources and prompts
pub struct McpServer {
    dispatcher: ToolDispatcher,
}

/// Tool definition as advertised by `tools/list`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<&ToolDescriptor> for ToolDefinition {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.to_string(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema(),
        }
    }
}

impl McpServer {
    pub fn new(client: Arc<BlazeClient>, config: Arc<ServerConfig>) -> Self {
        info!(
            "Blaze MCP server configured for {} (admin tools {})",
            config.blaze_base_url,
            if config.admin_tools_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        Self {
            dispatcher: ToolDispatcher::new(client, config),
        }
    }

    /// Build a server and its client from configuration
    pub fn from_config(config: ServerConfig) -> Self {
        let client = Arc::new(BlazeClient::from_config(&config));
        Self::new(client, Arc::new(config))
    }

    pub fn config(&self) -> &ServerConfig {
        self.dispatcher.config()
    }

    pub fn client(&self) -> &Arc<BlazeClient> {
        self.dispatcher.client()
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Every tool visible to clients
    pub fn get_tools(&self) -> Vec<ToolDefinition> {
        self.dispatcher.tools().iter().map(ToolDefinition::from).collect()
    }

    /// Run a tool and return its text payload. Never fails.
    pub async fn handle_tool_call(&self, name: &str, arguments: Value) -> String {
        self.dispatcher.call(name, arguments).await
    }

    /// Close every pooled connection to Blaze.
    pub async fn close(&self) {
        self.client().close().await;
    }

    fn initialize_result(&self, requested: Option<&str>) -> Value {
        let protocol_version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        json!({
            "protocolVersion": protocol_version,
            "serverInfo": {
                "name": SERVER_NAME,
                "version": crate::VERSION
            },
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false },
                "prompts": { "listChanged": false }
            }
        })
    }

    async fn read_resource(&self, id: RequestId, uri: &str) -> Result<McpMessage> {
        let message = match resources::read(self.client(), uri).await {
            Ok(contents) => McpMessage::result(id, json!({ "contents": [contents] })),
            Err(e @ ResourceError::UnknownUri(_)) => {
                McpMessage::error(Some(id), McpError::invalid_params(e.to_string()))
            }
            Err(e) => {
                warn!("Failed to read resource {}: {}", uri, e);
                McpMessage::error(Some(id), McpError::internal(e.to_string()))
            }
        };
        Ok(message)
    }
}

/// Implementation of MessageHandler for McpServer
#[async_trait]
impl MessageHandler for McpServer {
    #[instrument(skip_all)]
    async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>> {
        let response = match message {
            McpMessage::Initialize { id, params } => {
                let client = params
                    .client_info
                    .as_ref()
                    .map(|info| info.name.as_str())
                    .unwrap_or("unknown");
                info!("Received initialize request from client: {}", client);
                McpMessage::result(
                    id,
                    self.initialize_result(params.protocol_version.as_deref()),
                )
            }

            McpMessage::Ping { id } => McpMessage::result(id, json!({})),

            McpMessage::ToolsList { id } => {
                debug!("Received tools list request");
                McpMessage::result(id, json!({ "tools": self.get_tools() }))
            }

            McpMessage::ToolsCall { id, params } => {
                info!("Received tool call: {}", params.name);
                let arguments = params.arguments.unwrap_or(Value::Null);
                let text = self.handle_tool_call(&params.name, arguments).await;
                McpMessage::result(
                    id,
                    json!({
                        "content": [
                            {
                                "type": "text",
                                "text": text
                            }
                        ]
                    }),
                )
            }

            McpMessage::ResourcesList { id } => {
                McpMessage::result(id, json!({ "resources": resources::list() }))
            }

            McpMessage::ResourcesRead { id, params } => {
                info!("Received resource read: {}", params.uri);
                self.read_resource(id, &params.uri).await?
            }

            McpMessage::PromptsList { id } => {
                McpMessage::result(id, json!({ "prompts": prompts::list() }))
            }

            McpMessage::PromptsGet { id, params } => {
                info!("Received prompt request: {}", params.name);
                let arguments = params.arguments.unwrap_or_default();
                match prompts::get(&params.name, &arguments) {
                    Ok(prompt) => McpMessage::result(id, serde_json::to_value(prompt)?),
                    Err(e @ PromptError::UnknownPrompt(_)) => {
                        McpMessage::error(Some(id), McpError::invalid_params(e.to_string()))
                    }
                }
            }

            McpMessage::Unsupported { id, method } => {
                warn!("Unsupported method: {}", method);
                McpMessage::error(Some(id), McpError::method_not_found(&method))
            }

            McpMessage::Notification { method, .. } => {
                debug!("Received notification: {}", method);
                return Ok(None);
            }

            McpMessage::Response { .. } => {
                // This server doesn't initiate requests, so we shouldn't receive responses
                warn!("Received unexpected response message");
                return Ok(None);
            }
        };

        Ok(Some(response))
    }
}
