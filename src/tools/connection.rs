//! Connection management: switch, show and probe the Blaze base URL

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{
    ToolContext, ToolDescriptor, ToolError, ToolGroup, ToolParameter, ToolParameterType,
    parse_args,
};
use crate::client::normalize_base_url;
use crate::config::{ServerConfig, has_http_scheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTool {
    SetUrl,
    GetUrl,
    TestConnection,
}

#[derive(Debug, Deserialize)]
struct SetUrlParams {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TestConnectionParams {
    url: Option<String>,
}

#[async_trait]
impl ToolGroup for ConnectionTool {
    fn all() -> &'static [Self] {
        &[
            ConnectionTool::SetUrl,
            ConnectionTool::GetUrl,
            ConnectionTool::TestConnection,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            ConnectionTool::SetUrl => "set_blaze_url",
            ConnectionTool::GetUrl => "get_blaze_url",
            ConnectionTool::TestConnection => "test_connection",
        }
    }

    fn descriptor(self, _config: &ServerConfig) -> ToolDescriptor {
        match self {
            ConnectionTool::SetUrl => ToolDescriptor::new(
                self.name(),
                "Set the Blaze FHIR server URL for subsequent operations. Use this when connecting to a different Blaze instance.",
                vec![ToolParameter::required(
                    "url",
                    ToolParameterType::String,
                    "The Blaze FHIR server base URL (e.g., http://192.168.1.100:8080/fhir)",
                )],
            ),
            ConnectionTool::GetUrl => ToolDescriptor::new(
                self.name(),
                "Get the currently configured Blaze FHIR server URL",
                vec![],
            ),
            ConnectionTool::TestConnection => ToolDescriptor::new(
                self.name(),
                "Test the connection to the Blaze server by fetching its CapabilityStatement",
                vec![ToolParameter::optional(
                    "url",
                    ToolParameterType::String,
                    "Optional: test a specific URL without changing the default",
                )],
            ),
        }
    }

    async fn execute(self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        match self {
            ConnectionTool::SetUrl => {
                let params: SetUrlParams = parse_args(self.name(), args)?;
                let url = normalize_base_url(&params.url);
                if !has_http_scheme(&url) {
                    return Err(ToolError::InvalidUrl(url));
                }
                let previous = ctx.client.set_base_url(&url).await;
                Ok(format!(
                    "Blaze URL updated:\n  Previous: {previous}\n  Current:  {url}"
                ))
            }
            ConnectionTool::GetUrl => Ok(format!(
                "Current Blaze URL: {}",
                ctx.client.base_url().await
            )),
            ConnectionTool::TestConnection => {
                let params: TestConnectionParams = parse_args(self.name(), args)?;
                test_connection(ctx, params.url.as_deref()).await
            }
        }
    }
}

/// Fetch the CapabilityStatement and describe the server behind it.
///
/// An override URL is probed directly; the active URL is never touched.
async fn test_connection(ctx: &ToolContext, url: Option<&str>) -> Result<String, ToolError> {
    let (target, result) = match url {
        Some(url) => {
            let target = normalize_base_url(url);
            let result = ctx.client.capabilities_at(&target).await;
            (target, result)
        }
        None => {
            let target = ctx.client.base_url().await;
            (target, ctx.client.capabilities().await)
        }
    };

    let capabilities =
        result.map_err(|source| ToolError::ConnectionFailed {
            target: target.clone(),
            source,
        })?;

    let software = capabilities.get("software");
    let field = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string()
    };
    let name = field(software.and_then(|s| s.get("name")));
    let version = field(software.and_then(|s| s.get("version")));
    let fhir_version = field(capabilities.get("fhirVersion"));

    Ok(format!(
        "Connection successful to {target}\n  Server: {name} {version}\n  FHIR Version: {fhir_version}"
    ))
}
