//! MCP tools implementation
//!
//! Tools are grouped by concern:
//! - connection: switch, show and probe the Blaze base URL
//! - crud: read, vread, create, update, delete, history, transaction
//! - search: type-level and system-wide search
//! - terminology: $validate-code, $expand, $lookup
//! - advanced: Patient $everything, $evaluate-measure, GraphQL
//! - admin: $totals, $compact, $re-index (only when enabled in config)
//!
//! [`ToolDispatcher`] builds a name -> [`ToolKind`] table once at startup.
//! Every tool call produces text; failures are reported in-band as
//! `Error: ...` and never escape as protocol errors.

pub mod admin;
pub mod advanced;
pub mod connection;
pub mod crud;
pub mod search;
pub mod summary;
pub mod terminology;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::client::{BlazeClient, ClientError};
use crate::config::ServerConfig;

pub use admin::AdminTool;
pub use advanced::AdvancedTool;
pub use connection::ConnectionTool;
pub use crud::CrudTool;
pub use search::SearchTool;
pub use terminology::TerminologyTool;

/// JSON type of a tool argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolParameterType {
    String,
    Integer,
    Object,
    /// Object of search parameters; values are strings or arrays of strings
    ParameterMap,
}

impl ToolParameterType {
    fn schema(self) -> Value {
        match self {
            ToolParameterType::String => json!({ "type": "string" }),
            ToolParameterType::Integer => json!({ "type": "integer" }),
            ToolParameterType::Object => json!({ "type": "object" }),
            ToolParameterType::ParameterMap => json!({
                "type": "object",
                "additionalProperties": {
                    "anyOf": [
                        { "type": "string" },
                        { "type": "array", "items": { "type": "string" } }
                    ]
                }
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolParameter {
    pub name: &'static str,
    pub description: String,
    pub parameter_type: ToolParameterType,
    pub required: bool,
}

impl ToolParameter {
    pub fn required(
        name: &'static str,
        parameter_type: ToolParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name,
            description: description.into(),
            parameter_type,
            required: true,
        }
    }

    pub fn optional(
        name: &'static str,
        parameter_type: ToolParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, parameter_type, description)
        }
    }
}

/// Name, description and input contract of one tool
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolDescriptor {
    pub fn new(
        name: &'static str,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
    ) -> Self {
        Self {
            name,
            description: description.into(),
            parameters,
        }
    }

    /// JSON schema advertised in `tools/list`
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for parameter in &self.parameters {
            let mut schema = parameter.parameter_type.schema();
            schema["description"] = Value::String(parameter.description.clone());
            properties.insert(parameter.name.to_string(), schema);
        }

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

/// Tool-level failure, rendered as `Error: {message}` at the protocol boundary
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("URL must start with http:// or https:// (got '{0}')")]
    InvalidUrl(String),

    #[error("Connection failed to {target}: {source}")]
    ConnectionFailed {
        target: String,
        #[source]
        source: ClientError,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to render response: {0}")]
    Render(#[source] serde_json::Error),
}

impl ToolError {
    /// Short machine-readable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArguments { .. } => "invalid_arguments",
            ToolError::InvalidUrl(_) => "invalid_url",
            ToolError::ConnectionFailed { .. } => "connection_failed",
            ToolError::Client(ClientError::HttpStatus { .. }) => "http_status",
            ToolError::Client(ClientError::Transport { .. }) => "transport",
            ToolError::Client(ClientError::Decode { .. }) => "decode",
            ToolError::Render(_) => "render",
        }
    }
}

/// Result of dispatching one tool call
#[derive(Debug)]
pub enum ToolOutcome {
    Success(String),
    Failure(ToolError),
    UnknownTool(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        !matches!(self, ToolOutcome::Success(_))
    }

    /// Text payload returned to the MCP client
    pub fn into_text(self) -> String {
        match self {
            ToolOutcome::Success(text) => text,
            ToolOutcome::Failure(error) => format!("Error: {error}"),
            ToolOutcome::UnknownTool(name) => format!("Unknown tool: {name}"),
        }
    }
}

/// Shared state every tool handler receives
#[derive(Clone)]
pub struct ToolContext {
    pub client: Arc<BlazeClient>,
    pub config: Arc<ServerConfig>,
}

/// A closed set of related tools
#[async_trait]
pub trait ToolGroup: Copy + Send + Sync + 'static {
    /// Every tool in the group, in catalog order
    fn all() -> &'static [Self];

    fn name(self) -> &'static str;

    fn descriptor(self, config: &ServerConfig) -> ToolDescriptor;

    async fn execute(self, ctx: &ToolContext, args: Value) -> Result<String, ToolError>;
}

/// Owning group and tool for a registered name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Connection(ConnectionTool),
    Crud(CrudTool),
    Search(SearchTool),
    Terminology(TerminologyTool),
    Advanced(AdvancedTool),
    Admin(AdminTool),
}

impl ToolKind {
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Connection(tool) => tool.name(),
            ToolKind::Crud(tool) => tool.name(),
            ToolKind::Search(tool) => tool.name(),
            ToolKind::Terminology(tool) => tool.name(),
            ToolKind::Advanced(tool) => tool.name(),
            ToolKind::Admin(tool) => tool.name(),
        }
    }

    async fn execute(self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        match self {
            ToolKind::Connection(tool) => tool.execute(ctx, args).await,
            ToolKind::Crud(tool) => tool.execute(ctx, args).await,
            ToolKind::Search(tool) => tool.execute(ctx, args).await,
            ToolKind::Terminology(tool) => tool.execute(ctx, args).await,
            ToolKind::Advanced(tool) => tool.execute(ctx, args).await,
            ToolKind::Admin(tool) => tool.execute(ctx, args).await,
        }
    }
}

/// Every tool visible under `config`, in catalog order
pub fn catalog(config: &ServerConfig) -> Vec<(ToolKind, ToolDescriptor)> {
    let mut entries = Vec::new();
    collect::<ConnectionTool>(&mut entries, config, ToolKind::Connection);
    collect::<CrudTool>(&mut entries, config, ToolKind::Crud);
    collect::<SearchTool>(&mut entries, config, ToolKind::Search);
    collect::<TerminologyTool>(&mut entries, config, ToolKind::Terminology);
    collect::<AdvancedTool>(&mut entries, config, ToolKind::Advanced);
    if config.admin_tools_enabled {
        collect::<AdminTool>(&mut entries, config, ToolKind::Admin);
    }
    entries
}

fn collect<G: ToolGroup>(
    entries: &mut Vec<(ToolKind, ToolDescriptor)>,
    config: &ServerConfig,
    wrap: fn(G) -> ToolKind,
) {
    for tool in G::all() {
        entries.push((wrap(*tool), tool.descriptor(config)));
    }
}

/// Routes tool calls by name to their group handler
pub struct ToolDispatcher {
    context: ToolContext,
    descriptors: Vec<ToolDescriptor>,
    routes: HashMap<&'static str, ToolKind>,
}

impl ToolDispatcher {
    pub fn new(client: Arc<BlazeClient>, config: Arc<ServerConfig>) -> Self {
        let entries = catalog(&config);
        let routes = entries
            .iter()
            .map(|(kind, descriptor)| (descriptor.name, *kind))
            .collect();
        let descriptors = entries.into_iter().map(|(_, descriptor)| descriptor).collect();

        Self {
            context: ToolContext { client, config },
            descriptors,
            routes,
        }
    }

    /// Descriptors for `tools/list`
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn lookup(&self, name: &str) -> Option<ToolKind> {
        self.routes.get(name).copied()
    }

    pub fn client(&self) -> &Arc<BlazeClient> {
        &self.context.client
    }

    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Run a tool and keep the typed outcome.
    #[instrument(skip(self, args))]
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolOutcome {
        let Some(kind) = self.lookup(name) else {
            warn!("Unknown tool requested");
            return ToolOutcome::UnknownTool(name.to_string());
        };

        info!("Executing tool");
        match kind.execute(&self.context, args).await {
            Ok(text) => ToolOutcome::Success(text),
            Err(error) => {
                warn!(kind = error.kind(), "Tool failed: {}", error);
                ToolOutcome::Failure(error)
            }
        }
    }

    /// Run a tool and render the outcome as text.
    pub async fn call(&self, name: &str, args: Value) -> String {
        self.dispatch(name, args).await.into_text()
    }
}

/// Deserialize tool arguments; a missing argument object counts as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &'static str, args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|source| ToolError::InvalidArguments { tool, source })
}

/// Pretty-print a JSON response the way every tool shows it
pub(crate) fn pretty(value: &Value) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value).map_err(ToolError::Render)
}

/// Non-negative count passed straight through (no clamping)
pub(crate) fn passthrough_count(count: Option<i64>) -> Option<u32> {
    count.and_then(|c| u32::try_from(c).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn dispatcher(config: ServerConfig) -> ToolDispatcher {
        let client = Arc::new(BlazeClient::new(
            "http://127.0.0.1:9/fhir",
            Duration::from_millis(200),
        ));
        ToolDispatcher::new(client, Arc::new(config))
    }

    fn names(dispatcher: &ToolDispatcher) -> Vec<&'static str> {
        dispatcher.tools().iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_catalog_contains_every_group() {
        let dispatcher = dispatcher(ServerConfig::default());
        let names = names(&dispatcher);

        for expected in [
            "set_blaze_url",
            "get_blaze_url",
            "test_connection",
            "read_resource",
            "vread_resource",
            "create_resource",
            "update_resource",
            "delete_resource",
            "get_history",
            "get_type_history",
            "transaction",
            "search_resources",
            "search_system",
            "validate_code",
            "expand_valueset",
            "lookup_code",
            "patient_everything",
            "evaluate_measure",
            "graphql_query",
            "get_totals",
            "run_compaction",
            "run_reindex",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
        assert_eq!(names.len(), 22);
        assert_eq!(names[0], "set_blaze_url");
    }

    #[test]
    fn test_tool_names_are_unique() {
        let dispatcher = dispatcher(ServerConfig::default());
        assert_eq!(dispatcher.routes.len(), dispatcher.tools().len());
    }

    #[tokio::test]
    async fn test_admin_tools_hidden_when_disabled() {
        let dispatcher = dispatcher(ServerConfig {
            admin_tools_enabled: false,
            ..ServerConfig::default()
        });
        let names = names(&dispatcher);

        for admin in ["get_totals", "run_compaction", "run_reindex"] {
            assert!(!names.contains(&admin));
            assert!(dispatcher.lookup(admin).is_none());
            assert_eq!(
                dispatcher.call(admin, json!({})).await,
                format!("Unknown tool: {admin}")
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dispatcher = dispatcher(ServerConfig::default());
        let outcome = dispatcher.dispatch("no_such_tool", json!({})).await;
        assert!(outcome.is_error());
        assert_eq!(outcome.into_text(), "Unknown tool: no_such_tool");
    }

    #[tokio::test]
    async fn test_missing_argument_is_in_band_error() {
        let dispatcher = dispatcher(ServerConfig::default());
        let outcome = dispatcher
            .dispatch("read_resource", json!({"resource_type": "Patient"}))
            .await;

        assert!(matches!(
            outcome,
            ToolOutcome::Failure(ToolError::InvalidArguments { tool: "read_resource", .. })
        ));
        let text = outcome.into_text();
        assert!(text.starts_with("Error: "));
        assert!(text.contains("resource_id"));
    }

    #[test]
    fn test_input_schema_shape() {
        let descriptor = ToolDescriptor::new(
            "example",
            "Example tool",
            vec![
                ToolParameter::required("resource_type", ToolParameterType::String, "Type"),
                ToolParameter::optional("count", ToolParameterType::Integer, "Count"),
            ],
        );
        let schema = descriptor.input_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["resource_type"]["type"], "string");
        assert_eq!(schema["properties"]["count"]["type"], "integer");
        assert_eq!(schema["properties"]["count"]["description"], "Count");
        assert_eq!(schema["required"], json!(["resource_type"]));
    }

    #[test]
    fn test_schema_without_required_fields() {
        let descriptor = ToolDescriptor::new("get_blaze_url", "Show URL", vec![]);
        let schema = descriptor.input_schema();
        assert!(schema.get("required").is_none());
        assert_eq!(schema["properties"], json!({}));
    }

    #[test]
    fn test_parse_args_treats_null_as_empty() {
        #[derive(serde::Deserialize)]
        struct OnlyOptional {
            url: Option<String>,
        }
        let parsed: OnlyOptional = parse_args("test_connection", Value::Null).unwrap();
        assert!(parsed.url.is_none());
    }

    #[test]
    fn test_passthrough_count() {
        assert_eq!(passthrough_count(Some(5)), Some(5));
        assert_eq!(passthrough_count(Some(-1)), None);
        assert_eq!(passthrough_count(None), None);
    }
}
