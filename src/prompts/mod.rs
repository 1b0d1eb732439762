//! Canned prompt templates for common Blaze workflows

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Entry of a `prompts/list` response
#[derive(Debug, Clone, Serialize)]
pub struct PromptDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptContent {
    #[serde(rename = "type")]
    pub content_type: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: PromptContent,
}

/// Result of a `prompts/get` request
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPrompt {
    pub description: String,
    pub messages: Vec<PromptMessage>,
}

impl RenderedPrompt {
    fn user(description: String, text: String) -> Self {
        Self {
            description,
            messages: vec![PromptMessage {
                role: "user",
                content: PromptContent {
                    content_type: "text",
                    text,
                },
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlazePrompt {
    PatientSummary,
    CohortQuery,
    AnalyzeMeasure,
    FhirQueryHelp,
}

impl BlazePrompt {
    pub const ALL: [BlazePrompt; 4] = [
        BlazePrompt::PatientSummary,
        BlazePrompt::CohortQuery,
        BlazePrompt::AnalyzeMeasure,
        BlazePrompt::FhirQueryHelp,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            BlazePrompt::PatientSummary => "patient_summary",
            BlazePrompt::CohortQuery => "cohort_query",
            BlazePrompt::AnalyzeMeasure => "analyze_measure",
            BlazePrompt::FhirQueryHelp => "fhir_query_help",
        }
    }

    pub fn descriptor(self) -> PromptDescriptor {
        let argument = |name, description| PromptArgument {
            name,
            description,
            required: true,
        };
        let (description, arguments) = match self {
            BlazePrompt::PatientSummary => (
                "Generate a clinical summary for a patient",
                vec![argument("patient_id", "The Patient resource ID")],
            ),
            BlazePrompt::CohortQuery => (
                "Help build a query to find a cohort of patients",
                vec![argument("criteria", "Description of the patient criteria")],
            ),
            BlazePrompt::AnalyzeMeasure => (
                "Analyze and explain a MeasureReport result",
                vec![argument("measure_id", "The Measure resource ID")],
            ),
            BlazePrompt::FhirQueryHelp => (
                "Help construct a FHIR search query",
                vec![
                    argument("resource_type", "The FHIR resource type to search"),
                    argument("goal", "What you're trying to find"),
                ],
            ),
        };
        PromptDescriptor {
            name: self.name(),
            description,
            arguments,
        }
    }

    /// Fill the template. Missing arguments render as empty text.
    pub fn render(self, args: &Map<String, Value>) -> RenderedPrompt {
        let arg = |name: &str| -> String {
            match args.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        };

        match self {
            BlazePrompt::PatientSummary => {
                let patient_id = arg("patient_id");
                RenderedPrompt::user(
                    format!("Generate clinical summary for patient {patient_id}"),
                    format!(
                        "Please generate a clinical summary for patient {patient_id}.

Use the patient_everything tool to retrieve all data for this patient, then create a structured summary including:

1. **Demographics**: Name, age, gender, contact information
2. **Active Conditions**: Current diagnoses and health issues
3. **Medications**: Current prescriptions and dosages
4. **Recent Encounters**: Last few visits and their purposes
5. **Key Observations**: Important vital signs and lab results
6. **Allergies**: Known allergies and intolerances
7. **Care Team**: Involved healthcare providers

Present the information in a clear, concise format suitable for clinical review."
                    ),
                )
            }
            BlazePrompt::CohortQuery => {
                let criteria = arg("criteria");
                RenderedPrompt::user(
                    format!("Build query for: {criteria}"),
                    format!(
                        "Help me build a FHIR search query to find patients matching these criteria:

{criteria}

Please:
1. Identify the relevant FHIR resource types needed
2. Determine the appropriate search parameters
3. Construct the search query step by step
4. Execute the search using the search_resources tool
5. Summarize the results

If the criteria would require CQL for complex logic, explain what would be needed."
                    ),
                )
            }
            BlazePrompt::AnalyzeMeasure => {
                let measure_id = arg("measure_id");
                RenderedPrompt::user(
                    format!("Analyze measure {measure_id}"),
                    format!(
                        "Please analyze the quality measure {measure_id}.

1. First, use read_resource to get the Measure definition
2. Explain what this measure is evaluating
3. Use evaluate_measure to run the measure (you may need to ask for the period)
4. Interpret the MeasureReport results:
   - Population counts (initial, denominator, numerator, etc.)
   - Calculated rates/percentages
   - What the results mean clinically
5. Suggest potential areas for improvement if applicable"
                    ),
                )
            }
            BlazePrompt::FhirQueryHelp => {
                let resource_type = arg("resource_type");
                let goal = arg("goal");
                RenderedPrompt::user(
                    format!("Help build {resource_type} query"),
                    format!(
                        "Help me construct a FHIR search query for {resource_type} resources.

Goal: {goal}

Please:
1. Read the blaze://capabilities resource to see available search parameters for {resource_type}
2. Recommend which search parameters to use
3. Explain the syntax for each parameter
4. Build and execute the query using search_resources
5. Show example results and explain how to refine the query if needed"
                    ),
                )
            }
        }
    }
}

pub fn list() -> Vec<PromptDescriptor> {
    BlazePrompt::ALL.iter().map(|p| p.descriptor()).collect()
}

/// Resolve `name` and render it with `args`.
pub fn get(name: &str, args: &Map<String, Value>) -> Result<RenderedPrompt, PromptError> {
    BlazePrompt::from_name(name)
        .map(|prompt| prompt.render(args))
        .ok_or_else(|| PromptError::UnknownPrompt(name.to_string()))
}
