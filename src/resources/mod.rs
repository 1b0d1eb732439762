//! MCP resources implementation
//!
//! Resources provide read-only views of the connected Blaze server: its
//! CapabilityStatement, the resource types it supports and the per-type
//! resource totals.

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::client::{BlazeClient, ClientError, FHIR_JSON};
use crate::tools::summary::totals;

const JSON: &str = "application/json";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Unknown resource URI: {0}")]
    UnknownUri(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to render resource: {0}")]
    Render(#[from] serde_json::Error),
}

/// Entry of a `resources/list` response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

/// Entry of a `resources/read` response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlazeResource {
    Capabilities,
    ResourceTypes,
    Totals,
}

impl BlazeResource {
    pub const ALL: [BlazeResource; 3] = [
        BlazeResource::Capabilities,
        BlazeResource::ResourceTypes,
        BlazeResource::Totals,
    ];

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.uri() == uri)
    }

    pub fn uri(self) -> &'static str {
        match self {
            BlazeResource::Capabilities => "blaze://capabilities",
            BlazeResource::ResourceTypes => "blaze://resource-types",
            BlazeResource::Totals => "blaze://totals",
        }
    }

    pub fn descriptor(self) -> ResourceDescriptor {
        let (name, description, mime_type) = match self {
            BlazeResource::Capabilities => (
                "FHIR CapabilityStatement",
                "The FHIR CapabilityStatement describing server capabilities",
                FHIR_JSON,
            ),
            BlazeResource::ResourceTypes => (
                "Supported Resource Types",
                "List of FHIR resource types supported by this server",
                JSON,
            ),
            BlazeResource::Totals => ("Resource Totals", "Count of resources by type", JSON),
        };
        ResourceDescriptor {
            uri: self.uri(),
            name,
            description,
            mime_type,
        }
    }

    /// Fetch the resource from Blaze and render it as text.
    pub async fn read(self, client: &BlazeClient) -> Result<ResourceContents, ResourceError> {
        let document = match self {
            BlazeResource::Capabilities => client.capabilities().await?,
            BlazeResource::ResourceTypes => resource_types(&client.capabilities().await?),
            BlazeResource::Totals => totals_map(&client.totals().await?),
        };
        let descriptor = self.descriptor();
        Ok(ResourceContents {
            uri: descriptor.uri.to_string(),
            mime_type: descriptor.mime_type.to_string(),
            text: serde_json::to_string_pretty(&document)?,
        })
    }
}

pub fn list() -> Vec<ResourceDescriptor> {
    BlazeResource::ALL.iter().map(|r| r.descriptor()).collect()
}

/// Resolve `uri` and read it.
pub async fn read(client: &BlazeClient, uri: &str) -> Result<ResourceContents, ResourceError> {
    let resource =
        BlazeResource::from_uri(uri).ok_or_else(|| ResourceError::UnknownUri(uri.to_string()))?;
    resource.read(client).await
}

/// `{"resourceTypes": [...]}` from `rest[0].resource[].type`, sorted
fn resource_types(capabilities: &Value) -> Value {
    let mut types: Vec<&str> = capabilities
        .get("rest")
        .and_then(|rest| rest.get(0))
        .and_then(|rest| rest.get("resource"))
        .and_then(Value::as_array)
        .map(|resources| {
            resources
                .iter()
                .filter_map(|r| r.get("type").and_then(Value::as_str))
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    types.sort_unstable();
    json!({ "resourceTypes": types })
}

fn totals_map(parameters: &Value) -> Value {
    let counts: Map<String, Value> = totals(parameters).into_iter().collect();
    Value::Object(counts)
}
