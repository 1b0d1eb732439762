#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use blaze_mcp::{BlazeClient, McpServer, ServerConfig, ToolDispatcher};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Test utilities for integration testing
pub mod test_utils {
    use super::*;

    /// Create a test FHIR Patient resource
    pub fn create_test_patient() -> Value {
        json!({
            "resourceType": "Patient",
            "id": "123",
            "name": [{
                "use": "official",
                "family": "Test",
                "given": ["John"]
            }],
            "gender": "male",
            "birthDate": "1980-01-01"
        })
    }

    /// Searchset with a single Patient and `total: 1`
    pub fn create_search_bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "total": 1,
            "entry": [{"resource": create_test_patient()}]
        })
    }

    /// `$everything` result: one Patient and two Observations
    pub fn create_everything_bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                {"resource": {"resourceType": "Patient", "id": "123"}},
                {"resource": {"resourceType": "Observation", "id": "obs1"}},
                {"resource": {"resourceType": "Observation", "id": "obs2"}}
            ]
        })
    }

    pub fn create_capability_statement() -> Value {
        json!({
            "resourceType": "CapabilityStatement",
            "status": "active",
            "fhirVersion": "4.0.1",
            "software": {"name": "Blaze", "version": "0.30.0"},
            "rest": [{
                "mode": "server",
                "resource": [
                    {"type": "Patient"},
                    {"type": "Encounter"},
                    {"type": "Observation"}
                ]
            }]
        })
    }

    pub fn create_totals() -> Value {
        json!({
            "resourceType": "Parameters",
            "parameter": [
                {"name": "Patient", "valueUnsignedInt": 42},
                {"name": "Observation", "valueUnsignedInt": 1337}
            ]
        })
    }

    pub fn create_operation_outcome(diagnostics: &str) -> Value {
        json!({
            "resourceType": "OperationOutcome",
            "issue": [{
                "severity": "error",
                "code": "not-found",
                "diagnostics": diagnostics
            }]
        })
    }
}

/// A wiremock server standing in for Blaze, mounted under `/fhir`
pub struct MockBlaze {
    pub server: MockServer,
}

impl MockBlaze {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// FHIR base URL of the mock, e.g. `http://127.0.0.1:1234/fhir`
    pub fn base_url(&self) -> String {
        format!("{}/fhir", self.server.uri())
    }

    /// Answer `verb {fhir_path}` with `status` and a JSON body.
    pub async fn respond(&self, verb: &str, fhir_path: &str, status: u16, body: Value) {
        Mock::given(method(verb))
            .and(path(format!("/fhir{fhir_path}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer `verb {fhir_path}` with an empty body.
    pub async fn respond_empty(&self, verb: &str, fhir_path: &str, status: u16) {
        Mock::given(method(verb))
            .and(path(format!("/fhir{fhir_path}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer every request with `body`.
    pub async fn respond_to_all(&self, body: Value) {
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// The single request the mock has seen
    pub async fn only_request(&self) -> Request {
        let mut requests = self.requests().await;
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests.remove(0)
    }

    pub fn client(&self) -> BlazeClient {
        BlazeClient::new(self.base_url(), Duration::from_secs(5))
    }

    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            blaze_base_url: self.base_url(),
            blaze_timeout: 5.0,
            ..ServerConfig::default()
        }
    }

    pub fn dispatcher(&self) -> ToolDispatcher {
        self.dispatcher_with(self.config())
    }

    pub fn dispatcher_with(&self, config: ServerConfig) -> ToolDispatcher {
        let client = Arc::new(BlazeClient::from_config(&config));
        ToolDispatcher::new(client, Arc::new(config))
    }

    pub fn mcp_server(&self) -> McpServer {
        McpServer::from_config(self.config())
    }
}

/// `(path, query)` of a received request; query is `None` when empty
pub fn path_and_query(request: &Request) -> (String, Option<String>) {
    (
        request.url.path().to_string(),
        request.url.query().map(str::to_string),
    )
}

/// A base URL nothing listens on
pub fn unreachable_base_url() -> &'static str {
    "http://127.0.0.1:9/fhir"
}
