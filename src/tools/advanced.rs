//! Patient compartment, quality measures and GraphQL

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::summary::compartment_summary;
use super::{
    ToolContext, ToolDescriptor, ToolError, ToolGroup, ToolParameter, ToolParameterType,
    parse_args, passthrough_count, pretty,
};
use crate::config::ServerConfig;

use ToolParameterType::{Integer, Object, String as Text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancedTool {
    PatientEverything,
    EvaluateMeasure,
    GraphQl,
}

#[derive(Debug, Deserialize)]
struct EverythingParams {
    patient_id: String,
    start: Option<String>,
    end: Option<String>,
    count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MeasureParams {
    measure_id: String,
    period_start: String,
    period_end: String,
    subject: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlParams {
    query: String,
    variables: Option<Value>,
}

#[async_trait]
impl ToolGroup for AdvancedTool {
    fn all() -> &'static [Self] {
        &[
            AdvancedTool::PatientEverything,
            AdvancedTool::EvaluateMeasure,
            AdvancedTool::GraphQl,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            AdvancedTool::PatientEverything => "patient_everything",
            AdvancedTool::EvaluateMeasure => "evaluate_measure",
            AdvancedTool::GraphQl => "graphql_query",
        }
    }

    fn descriptor(self, _config: &ServerConfig) -> ToolDescriptor {
        match self {
            AdvancedTool::PatientEverything => ToolDescriptor::new(
                self.name(),
                "Get all resources in a patient's compartment ($everything)",
                vec![
                    ToolParameter::required("patient_id", Text, "The Patient resource ID"),
                    ToolParameter::optional("start", Text, "Start date filter (YYYY-MM-DD)"),
                    ToolParameter::optional("end", Text, "End date filter (YYYY-MM-DD)"),
                    ToolParameter::optional(
                        "count",
                        Integer,
                        "Maximum number of resources to return",
                    ),
                ],
            ),
            AdvancedTool::EvaluateMeasure => ToolDescriptor::new(
                self.name(),
                "Evaluate a quality measure against patient data",
                vec![
                    ToolParameter::required("measure_id", Text, "The Measure resource ID"),
                    ToolParameter::required(
                        "period_start",
                        Text,
                        "Measurement period start (YYYY-MM-DD)",
                    ),
                    ToolParameter::required(
                        "period_end",
                        Text,
                        "Measurement period end (YYYY-MM-DD)",
                    ),
                    ToolParameter::optional(
                        "subject",
                        Text,
                        "Subject reference (e.g., Patient/123 or Group/456)",
                    ),
                ],
            ),
            AdvancedTool::GraphQl => ToolDescriptor::new(
                self.name(),
                "Execute a GraphQL query against the FHIR server",
                vec![
                    ToolParameter::required("query", Text, "The GraphQL query string"),
                    ToolParameter::optional("variables", Object, "GraphQL variables (optional)"),
                ],
            ),
        }
    }

    async fn execute(self, ctx: &ToolContext, args: Value) -> Result<String, ToolError> {
        match self {
            AdvancedTool::PatientEverything => {
                let p: EverythingParams = parse_args(self.name(), args)?;
                let bundle = ctx
                    .client
                    .patient_everything(
                        &p.patient_id,
                        p.start.as_deref(),
                        p.end.as_deref(),
                        passthrough_count(p.count),
                    )
                    .await?;
                Ok(format!(
                    "{}\n{}",
                    compartment_summary(&p.patient_id, &bundle),
                    pretty(&bundle)?
                ))
            }
            AdvancedTool::EvaluateMeasure => {
                let p: MeasureParams = parse_args(self.name(), args)?;
                let report = ctx
                    .client
                    .evaluate_measure(
                        &p.measure_id,
                        &p.period_start,
                        &p.period_end,
                        p.subject.as_deref(),
                    )
                    .await?;
                pretty(&report)
            }
            AdvancedTool::GraphQl => {
                let p: GraphQlParams = parse_args(self.name(), args)?;
                let result = ctx.client.graphql(&p.query, p.variables.as_ref()).await?;
                pretty(&result)
            }
        }
    }
}
