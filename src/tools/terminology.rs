//! Terminology service operations

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{
    ToolContext, ToolDescriptor, ToolError, ToolGroup, ToolParameter, ToolParameterType,
    parse_args, passthrough_count, pretty,
};
use crate::config::ServerConfig;

use ToolParameterType::{Integer, String as Text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminologyTool {
    ValidateCode,
    ExpandValueSet,
    LookupCode,
}

#[derive(Debug, Deserialize)]
struct ValidateCodeParams {
    system: String,
    code: String,
    display: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpandParams {
    valueset_id: Option<String>,
    url: Option<String>,
    filter: Option<String>,
    count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LookupParams {
    system: String,
    code: String,
}

#[async_trait]
impl ToolGroup for TerminologyTool {
    fn all() -> &'static [Self] {
        &[
            TerminologyTool::ValidateCode,
            TerminologyTool::ExpandValueSet,
            TerminologyTool::LookupCode,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            TerminologyTool::ValidateCode => "validate_code",
            TerminologyTool::ExpandValueSet => "expand_valueset",
            TerminologyTool::LookupCode => "lookup_code",
        }
    }

    fn descriptor(self, _config: &ServerConfig) -> ToolDescriptor {
        match self {
            TerminologyTool::ValidateCode => ToolDescriptor::new(
                self.name(),
                "Validate a code against a code system",
                vec![
                    ToolParameter::required(
                        "system",
                        Text,
                        "The code system URL (e.g., http://loinc.org)",
                    ),
                    ToolParameter::required("code", Text, "The code to validate"),
                    ToolParameter::optional("display", Text, "Optional display text to validate"),
                ],
            ),
            TerminologyTool::ExpandValueSet => ToolDescriptor::new(
                self.name(),
                "Expand a value set to list all contained codes",
                vec![
                    ToolParameter::optional("valueset_id", Text, "The ValueSet resource ID"),
                    ToolParameter::optional(
                        "url",
                        Text,
                        "The ValueSet canonical URL (alternative to ID)",
                    ),
                    ToolParameter::optional(
                        "filter",
                        Text,
                        "Filter text to search within the value set",
                    ),
                    ToolParameter::optional("count", Integer, "Maximum number of codes to return"),
                ],
            ),
            TerminologyTool::LookupCode => ToolDescriptor::new(
                self.name(),
                "Look up detailed information about a code",
                vec![
                    ToolParameter::required("system", Text, "The code system URL"),
                    ToolParameter::required("code", Text, "The code to look up"),
                ],
            ),
        }
    }

    async fn execute(self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        let result = match self {
            TerminologyTool::ValidateCode => {
                let p: ValidateCodeParams = parse_args(self.name(), args)?;
                ctx.client
                    .validate_code(&p.system, &p.code, p.display.as_deref())
                    .await?
            }
            TerminologyTool::ExpandValueSet => {
                let p: ExpandParams = parse_args(self.name(), args)?;
                ctx.client
                    .expand_valueset(
                        p.valueset_id.as_deref(),
                        p.url.as_deref(),
                        p.filter.as_deref(),
                        passthrough_count(p.count),
                    )
                    .await?
            }
            TerminologyTool::LookupCode => {
                let p: LookupParams = parse_args(self.name(), args)?;
                ctx.client.lookup_code(&p.system, &p.code).await?
            }
        };
        pretty(&result)
    }
}
