//! Integration tests for the MCP protocol surface of the server

use blaze_mcp::transport::{
    INVALID_PARAMS, METHOD_NOT_FOUND, McpError, McpMessage, MessageHandler,
};
use serde_json::{Value, json};

mod common;

use common::{MockBlaze, test_utils};

/// Feed one JSON-RPC text through the server and return the response as JSON.
async fn exchange(blaze: &MockBlaze, request: Value) -> Option<Value> {
    let server = blaze.mcp_server();
    let message = McpMessage::parse(&request.to_string()).unwrap();
    let response = server.handle_message(message).await.unwrap()?;
    Some(serde_json::from_str(&response.to_json_string().unwrap()).unwrap())
}

fn error_of(response: &Value) -> McpError {
    serde_json::from_value(response["error"].clone()).unwrap()
}

#[tokio::test]
async fn test_initialize_handshake() {
    let blaze = MockBlaze::start().await;
    let response = exchange(
        &blaze,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            }
        }),
    )
    .await
    .unwrap();

    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(response["result"]["serverInfo"]["name"], "blaze-mcp");
    for capability in ["tools", "resources", "prompts"] {
        assert!(response["result"]["capabilities"].get(capability).is_some());
    }
}

#[tokio::test]
async fn test_tools_list_schema() {
    let blaze = MockBlaze::start().await;
    let response = exchange(&blaze, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .await
        .unwrap();

    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 22);

    let read = tools.iter().find(|t| t["name"] == "read_resource").unwrap();
    assert_eq!(read["inputSchema"]["type"], "object");
    assert_eq!(
        read["inputSchema"]["required"],
        json!(["resource_type", "resource_id"])
    );
}

#[tokio::test]
async fn test_tool_call_failure_is_successful_result() {
    let blaze = MockBlaze::start().await;
    let response = exchange(
        &blaze,
        json!({
            "jsonrpc": "2.0",
            "id": "call-1",
            "method": "tools/call",
            "params": {"name": "read_resource", "arguments": {"resource_type": "Patient"}}
        }),
    )
    .await
    .unwrap();

    assert_eq!(response["id"], "call-1");
    assert!(response.get("error").is_none());
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error: "));
}

#[tokio::test]
async fn test_resources_list_and_read() {
    let blaze = MockBlaze::start().await;
    blaze
        .respond("GET", "/metadata", 200, test_utils::create_capability_statement())
        .await;
    blaze
        .respond("GET", "/$totals", 200, test_utils::create_totals())
        .await;

    let list = exchange(&blaze, json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"}))
        .await
        .unwrap();
    let uris: Vec<&str> = list["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uri"].as_str().unwrap())
        .collect();
    assert_eq!(
        uris,
        ["blaze://capabilities", "blaze://resource-types", "blaze://totals"]
    );
    assert_eq!(list["result"]["resources"][0]["mimeType"], "application/fhir+json");

    let types = exchange(
        &blaze,
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "resources/read",
            "params": {"uri": "blaze://resource-types"}
        }),
    )
    .await
    .unwrap();
    let contents = &types["result"]["contents"][0];
    assert_eq!(contents["mimeType"], "application/json");
    let parsed: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(
        parsed,
        json!({"resourceTypes": ["Encounter", "Observation", "Patient"]})
    );

    let totals = exchange(
        &blaze,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "resources/read",
            "params": {"uri": "blaze://totals"}
        }),
    )
    .await
    .unwrap();
    let parsed: Value =
        serde_json::from_str(totals["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(parsed, json!({"Patient": 42, "Observation": 1337}));
}

#[tokio::test]
async fn test_unknown_resource_is_protocol_error() {
    let blaze = MockBlaze::start().await;
    let response = exchange(
        &blaze,
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "resources/read",
            "params": {"uri": "blaze://nothing"}
        }),
    )
    .await
    .unwrap();

    let error = error_of(&response);
    assert_eq!(error.code, INVALID_PARAMS);
    assert_eq!(error.message, "Unknown resource URI: blaze://nothing");
}

#[tokio::test]
async fn test_prompts() {
    let blaze = MockBlaze::start().await;
    let list = exchange(&blaze, json!({"jsonrpc": "2.0", "id": 1, "method": "prompts/list"}))
        .await
        .unwrap();
    assert_eq!(list["result"]["prompts"].as_array().unwrap().len(), 4);

    let prompt = exchange(
        &blaze,
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "prompts/get",
            "params": {"name": "cohort_query", "arguments": {"criteria": "diabetics over 60"}}
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        prompt["result"]["description"],
        "Build query for: diabetics over 60"
    );
    assert_eq!(prompt["result"]["messages"][0]["role"], "user");

    let unknown = exchange(
        &blaze,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "prompts/get",
            "params": {"name": "nope"}
        }),
    )
    .await
    .unwrap();
    assert_eq!(error_of(&unknown).code, INVALID_PARAMS);
}

#[tokio::test]
async fn test_ping_and_unknown_method() {
    let blaze = MockBlaze::start().await;

    let pong = exchange(&blaze, json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}))
        .await
        .unwrap();
    assert_eq!(pong["result"], json!({}));

    let unknown = exchange(
        &blaze,
        json!({"jsonrpc": "2.0", "id": 10, "method": "logging/setLevel"}),
    )
    .await
    .unwrap();
    assert_eq!(error_of(&unknown).code, METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_notification_has_no_response() {
    let blaze = MockBlaze::start().await;
    let response = exchange(
        &blaze,
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    )
    .await;
    assert!(response.is_none());
}
