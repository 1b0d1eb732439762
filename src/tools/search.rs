//! Type-level and system-wide search

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::summary::search_summary;
use super::{
    ToolContext, ToolDescriptor, ToolError, ToolGroup, ToolParameter, ToolParameterType,
    parse_args, pretty,
};
use crate::config::ServerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTool {
    Resources,
    System,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    resource_type: String,
    params: Option<Map<String, Value>>,
    count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SystemSearchParams {
    params: Option<Map<String, Value>>,
    count: Option<i64>,
}

fn params_parameter() -> ToolParameter {
    ToolParameter::optional(
        "params",
        ToolParameterType::ParameterMap,
        "Search parameters as key-value pairs",
    )
}

fn count_parameter(config: &ServerConfig) -> ToolParameter {
    ToolParameter::optional(
        "count",
        ToolParameterType::Integer,
        format!(
            "Max resources to return (default: {}, max: {})",
            config.default_page_size, config.max_page_size
        ),
    )
}

#[async_trait]
impl ToolGroup for SearchTool {
    fn all() -> &'static [Self] {
        &[SearchTool::Resources, SearchTool::System]
    }

    fn name(self) -> &'static str {
        match self {
            SearchTool::Resources => "search_resources",
            SearchTool::System => "search_system",
        }
    }

    fn descriptor(self, config: &ServerConfig) -> ToolDescriptor {
        match self {
            SearchTool::Resources => ToolDescriptor::new(
                self.name(),
                "Search for FHIR resources of a given type with query parameters",
                vec![
                    ToolParameter::required(
                        "resource_type",
                        ToolParameterType::String,
                        "FHIR resource type (e.g., Patient, Observation)",
                    ),
                    params_parameter(),
                    count_parameter(config),
                ],
            ),
            SearchTool::System => ToolDescriptor::new(
                self.name(),
                "Search across all FHIR resource types",
                vec![params_parameter(), count_parameter(config)],
            ),
        }
    }

    async fn execute(self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        let bundle = match self {
            SearchTool::Resources => {
                let p: SearchParams = parse_args(self.name(), args)?;
                let count = ctx.config.page_size(p.count);
                ctx.client
                    .search(&p.resource_type, p.params.as_ref(), Some(count))
                    .await?
            }
            SearchTool::System => {
                let p: SystemSearchParams = parse_args(self.name(), args)?;
                let count = ctx.config.page_size(p.count);
                ctx.client
                    .search_system(p.params.as_ref(), Some(count))
                    .await?
            }
        };
        Ok(format!("{}\n\n{}", search_summary(&bundle), pretty(&bundle)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_description_reflects_config() {
        let config = ServerConfig {
            default_page_size: 15,
            max_page_size: 50,
            ..ServerConfig::default()
        };
        let schema = SearchTool::Resources.descriptor(&config).input_schema();
        assert_eq!(
            schema["properties"]["count"]["description"],
            "Max resources to return (default: 15, max: 50)"
        );
        assert_eq!(schema["required"], serde_json::json!(["resource_type"]));
    }

    #[test]
    fn test_system_search_has_no_required_fields() {
        let schema = SearchTool::System
            .descriptor(&ServerConfig::default())
            .input_schema();
        assert!(schema.get("required").is_none());
        assert_eq!(schema["properties"]["params"]["type"], "object");
    }
}
