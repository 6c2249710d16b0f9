//! JSON-RPC behaviour of the stdio tool server

mod common;

use common::gateway;
use serde_json::{json, Value};
use tiergate::mcp::serve_io;

/// Feed `lines` to the server and collect its responses
async fn exchange(lines: &[Value]) -> Vec<Value> {
    let (mut gateway, _connector) = gateway();
    let input: String = lines.iter().map(|line| format!("{line}\n")).collect();
    let mut output = Vec::new();

    serve_io(&mut gateway, input.as_bytes(), &mut output).await.unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

/// Decode the tool response embedded in a `tools/call` result
fn tool_response(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let responses = exchange(&[
        json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
    ])
    .await;

    // The notification gets no response
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "tiergate");

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 13);
    for tool in tools {
        assert!(tool["description"].as_str().is_some_and(|d| !d.is_empty()));
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[tokio::test]
async fn test_blocked_write_is_a_tool_error() {
    let responses = exchange(&[
        call(1, "switch_environment", json!({ "environment": "production" })),
        call(2, "delete_data", json!({ "table": "users", "where": "id = 1" })),
    ])
    .await;

    assert_eq!(responses[0]["result"]["isError"], false);
    assert_eq!(tool_response(&responses[0])["environment"], "production");

    assert!(responses[1].get("error").is_none());
    assert_eq!(responses[1]["result"]["isError"], true);
    let blocked = tool_response(&responses[1]);
    assert_eq!(blocked["status"], "error");
    assert_eq!(blocked["error"]["code"], "PRODUCTION_PROTECTION");
}

#[tokio::test]
async fn test_confirmation_prompt_is_not_an_error() {
    let responses = exchange(&[
        call(1, "switch_environment", json!({ "environment": "staging" })),
        call(2, "execute_query", json!({ "query": "TRUNCATE TABLE sessions" })),
    ])
    .await;

    assert_eq!(responses[1]["result"]["isError"], false);
    assert_eq!(tool_response(&responses[1])["status"], "confirmation_required");
}

#[tokio::test]
async fn test_protocol_errors() {
    let (mut gateway, _connector) = gateway();
    let input = "this is not json\n\n{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"resources/list\"}\n{\"jsonrpc\":\"2.0\",\"id\":4,\"method\":\"tools/call\"}\n";
    let mut output = Vec::new();

    serve_io(&mut gateway, input.as_bytes(), &mut output).await.unwrap();

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert_eq!(responses[1]["id"], 3);
    assert_eq!(responses[1]["error"]["code"], -32601);
    assert_eq!(responses[2]["error"]["code"], -32603);
    assert!(responses[2]["error"]["message"].as_str().unwrap().contains("Missing params"));
}

#[tokio::test]
async fn test_ping() {
    let responses = exchange(&[json!({ "jsonrpc": "2.0", "id": "a", "method": "ping" })]).await;
    assert_eq!(responses[0]["id"], "a");
    assert_eq!(responses[0]["result"], json!({}));
}
