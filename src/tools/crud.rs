//! CRUD, history and transaction tools

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{
    ToolContext, ToolDescriptor, ToolError, ToolGroup, ToolParameter, ToolParameterType,
    parse_args, passthrough_count, pretty,
};
use crate::config::ServerConfig;

use ToolParameterType::{Integer, Object, String as Text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudTool {
    Read,
    VRead,
    Create,
    Update,
    Delete,
    History,
    TypeHistory,
    Transaction,
}

#[derive(Debug, Deserialize)]
struct ResourceRef {
    resource_type: String,
    resource_id: String,
}

#[derive(Debug, Deserialize)]
struct VReadParams {
    resource_type: String,
    resource_id: String,
    version_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateParams {
    resource_type: String,
    resource: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateParams {
    resource_type: String,
    resource_id: String,
    resource: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    resource_type: String,
    resource_id: String,
    count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TypeHistoryParams {
    resource_type: String,
    count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TransactionParams {
    bundle: Map<String, Value>,
}

fn resource_type(description: &str) -> ToolParameter {
    ToolParameter::required("resource_type", Text, description)
}

fn resource_id() -> ToolParameter {
    ToolParameter::required("resource_id", Text, "Resource ID")
}

#[async_trait]
impl ToolGroup for CrudTool {
    fn all() -> &'static [Self] {
        &[
            CrudTool::Read,
            CrudTool::VRead,
            CrudTool::Create,
            CrudTool::Update,
            CrudTool::Delete,
            CrudTool::History,
            CrudTool::TypeHistory,
            CrudTool::Transaction,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            CrudTool::Read => "read_resource",
            CrudTool::VRead => "vread_resource",
            CrudTool::Create => "create_resource",
            CrudTool::Update => "update_resource",
            CrudTool::Delete => "delete_resource",
            CrudTool::History => "get_history",
            CrudTool::TypeHistory => "get_type_history",
            CrudTool::Transaction => "transaction",
        }
    }

    fn descriptor(self, _config: &ServerConfig) -> ToolDescriptor {
        let (description, parameters) = match self {
            CrudTool::Read => (
                "Read a FHIR resource by type and ID",
                vec![
                    resource_type("FHIR resource type (e.g., Patient, Observation)"),
                    resource_id(),
                ],
            ),
            CrudTool::VRead => (
                "Read a specific version of a FHIR resource",
                vec![
                    resource_type("FHIR resource type"),
                    resource_id(),
                    ToolParameter::required("version_id", Text, "Version ID"),
                ],
            ),
            CrudTool::Create => (
                "Create a new FHIR resource",
                vec![
                    resource_type("FHIR resource type"),
                    ToolParameter::required(
                        "resource",
                        Object,
                        "The FHIR resource to create (JSON object)",
                    ),
                ],
            ),
            CrudTool::Update => (
                "Update an existing FHIR resource",
                vec![
                    resource_type("FHIR resource type"),
                    resource_id(),
                    ToolParameter::required(
                        "resource",
                        Object,
                        "The updated FHIR resource (JSON object)",
                    ),
                ],
            ),
            CrudTool::Delete => (
                "Delete a FHIR resource",
                vec![resource_type("FHIR resource type"), resource_id()],
            ),
            CrudTool::History => (
                "Get the version history of a FHIR resource",
                vec![
                    resource_type("FHIR resource type"),
                    resource_id(),
                    ToolParameter::optional(
                        "count",
                        Integer,
                        "Maximum number of versions to return",
                    ),
                ],
            ),
            CrudTool::TypeHistory => (
                "Get the change history of all resources of a FHIR resource type",
                vec![
                    resource_type("FHIR resource type"),
                    ToolParameter::optional(
                        "count",
                        Integer,
                        "Maximum number of history entries to return",
                    ),
                ],
            ),
            CrudTool::Transaction => (
                "Execute a FHIR transaction bundle",
                vec![ToolParameter::required(
                    "bundle",
                    Object,
                    "FHIR Bundle resource with type 'transaction' or 'batch'",
                )],
            ),
        };
        ToolDescriptor::new(self.name(), description, parameters)
    }

    async fn execute(self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        let client = &ctx.client;
        let result = match self {
            CrudTool::Read => {
                let p: ResourceRef = parse_args(self.name(), args)?;
                client.read(&p.resource_type, &p.resource_id).await?
            }
            CrudTool::VRead => {
                let p: VReadParams = parse_args(self.name(), args)?;
                client
                    .vread(&p.resource_type, &p.resource_id, &p.version_id)
                    .await?
            }
            CrudTool::Create => {
                let p: CreateParams = parse_args(self.name(), args)?;
                client
                    .create(&p.resource_type, &Value::Object(p.resource))
                    .await?
            }
            CrudTool::Update => {
                let p: UpdateParams = parse_args(self.name(), args)?;
                client
                    .update(&p.resource_type, &p.resource_id, &Value::Object(p.resource))
                    .await?
            }
            CrudTool::Delete => {
                let p: ResourceRef = parse_args(self.name(), args)?;
                let deleted = client.delete(&p.resource_type, &p.resource_id).await?;
                return Ok(format!("Resource deleted: {deleted}"));
            }
            CrudTool::History => {
                let p: HistoryParams = parse_args(self.name(), args)?;
                client
                    .history(&p.resource_type, &p.resource_id, passthrough_count(p.count))
                    .await?
            }
            CrudTool::TypeHistory => {
                let p: TypeHistoryParams = parse_args(self.name(), args)?;
                client
                    .history_type(&p.resource_type, passthrough_count(p.count))
                    .await?
            }
            CrudTool::Transaction => {
                let p: TransactionParams = parse_args(self.name(), args)?;
                client.transaction(&Value::Object(p.bundle)).await?
            }
        };
        pretty(&result)
    }
}
