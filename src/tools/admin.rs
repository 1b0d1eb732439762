//! Blaze maintenance operations, registered only when admin tools are enabled

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::summary::totals_listing;
use super::{
    ToolContext, ToolDescriptor, ToolError, ToolGroup, ToolParameter, ToolParameterType,
    parse_args, pretty,
};
use crate::config::ServerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTool {
    Totals,
    Compaction,
    Reindex,
}

#[derive(Debug, Deserialize)]
struct CompactionParams {
    column_family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReindexParams {
    resource_type: Option<String>,
    search_param: Option<String>,
}

#[async_trait]
impl ToolGroup for AdminTool {
    fn all() -> &'static [Self] {
        &[AdminTool::Totals, AdminTool::Compaction, AdminTool::Reindex]
    }

    fn name(self) -> &'static str {
        match self {
            AdminTool::Totals => "get_totals",
            AdminTool::Compaction => "run_compaction",
            AdminTool::Reindex => "run_reindex",
        }
    }

    fn descriptor(self, _config: &ServerConfig) -> ToolDescriptor {
        match self {
            AdminTool::Totals => ToolDescriptor::new(
                self.name(),
                "Get resource counts by type (fast O(1) operation)",
                vec![],
            ),
            AdminTool::Compaction => ToolDescriptor::new(
                self.name(),
                "Trigger database compaction",
                vec![ToolParameter::optional(
                    "column_family",
                    ToolParameterType::String,
                    "Specific column family to compact (optional)",
                )],
            ),
            AdminTool::Reindex => ToolDescriptor::new(
                self.name(),
                "Trigger re-indexing of search parameters",
                vec![
                    ToolParameter::optional(
                        "resource_type",
                        ToolParameterType::String,
                        "Resource type to re-index (optional, all if not specified)",
                    ),
                    ToolParameter::optional(
                        "search_param",
                        ToolParameterType::String,
                        "Specific search parameter to re-index (optional)",
                    ),
                ],
            ),
        }
    }

    async fn execute(self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        match self {
            AdminTool::Totals => {
                let parameters = ctx.client.totals().await?;
                Ok(totals_listing(&parameters))
            }
            AdminTool::Compaction => {
                let p: CompactionParams = parse_args(self.name(), args)?;
                let result = ctx.client.compact(p.column_family.as_deref()).await?;
                Ok(format!("Compaction triggered: {}", pretty(&result)?))
            }
            AdminTool::Reindex => {
                let p: ReindexParams = parse_args(self.name(), args)?;
                let result = ctx
                    .client
                    .reindex(p.resource_type.as_deref(), p.search_param.as_deref())
                    .await?;
                Ok(format!("Re-index triggered: {}", pretty(&result)?))
            }
        }
    }
}
