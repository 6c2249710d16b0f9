//! MCP (Model Context Protocol) Server
//!
//! This module implements an MCP tool server using manual JSON-RPC 2.0 over stdio.
//!
//! # Architecture
//!
//! - **Transport**: JSON-RPC 2.0 over stdio (line-based)
//! - **Dependencies**: Only `serde_json` and anyhow (no MCP-specific crates)
//! - **State**: One [`Gateway`] for the whole process; requests are handled strictly
//!   one at a time, in arrival order
//!
//! Every tool outcome, including blocked writes and confirmation prompts, is returned as
//! a tool result whose text is the JSON [`ToolResponse`](crate::output::ToolResponse).
//! `isError` is set only for `status: "error"`. JSON-RPC errors are reserved for
//! protocol problems (bad JSON, unknown methods, missing params).
//!
//! Logs go to stderr; stdout carries nothing but JSON-RPC responses.
//!
//! # Usage
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "tiergate": {
//!       "command": "tiergate",
//!       "args": ["serve"]
//!     }
//!   }
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};

use crate::engine::Connector;
use crate::pipeline::Gateway;
use crate::tools::tool_definitions;

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INTERNAL_ERROR: i32 = -32603;

// ============================================================================
// JSON-RPC 2.0 Structures
// ============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn result(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message, data: None }),
        }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

// ============================================================================
// MCP Tool Result Structures
// ============================================================================

/// Text content block for MCP tool results
#[derive(Debug, Serialize)]
struct TextContent {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

impl TextContent {
    fn new(text: String) -> Self {
        Self { content_type: "text".to_string(), text }
    }
}

/// MCP tool call result
#[derive(Debug, Serialize)]
struct CallToolResult {
    content: Vec<TextContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl CallToolResult {
    fn new(data: &impl Serialize, is_error: bool) -> Result<Value> {
        let json_text = serde_json::to_string_pretty(data)?;
        let result = Self { content: vec![TextContent::new(json_text)], is_error };
        Ok(serde_json::to_value(result)?)
    }
}

// ============================================================================
// MCP Server
// ============================================================================

/// Serve tool calls over stdin/stdout until stdin closes
///
/// # Errors
///
/// Returns an error if stdio communication fails.
#[allow(clippy::future_not_send)]
pub async fn serve<C: Connector>(mut gateway: Gateway<C>) -> Result<()> {
    let active = gateway.session().active();
    info!(environment = %active.id, tier = %active.tier, "Tool server listening on stdio");

    let stdin = io::stdin();
    let result = serve_io(&mut gateway, stdin.lock(), io::stdout()).await;

    if let Err(e) = gateway.shutdown().await {
        warn!(error = %e, "Failed to close connection on shutdown");
    }
    result
}

/// Serve line-delimited JSON-RPC from `reader`, writing responses to `writer`
///
/// # Errors
///
/// Returns an error if reading or writing fails.
#[allow(clippy::future_not_send)]
pub async fn serve_io<C: Connector>(
    gateway: &mut Gateway<C>,
    reader: impl BufRead,
    mut writer: impl Write,
) -> Result<()> {
    for line in reader.lines() {
        let line = line?;

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => handle_request(gateway, request).await,
            Err(e) => {
                warn!(error = %e, "Unparseable JSON-RPC message");
                Some(JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {e}")))
            }
        };

        if let Some(response) = response {
            let response_json = serde_json::to_string(&response)?;
            writeln!(writer, "{response_json}")?;
            writer.flush()?;
        }
    }

    Ok(())
}

/// Handle a JSON-RPC message; notifications get no response
async fn handle_request<C: Connector>(
    gateway: &mut Gateway<C>,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    debug!(method = %request.method, "JSON-RPC request");

    if request.id.is_none() {
        // Notifications (e.g. notifications/initialized) are acknowledged silently
        return None;
    }

    let result = match request.method.as_str() {
        "initialize" => Ok(handle_initialize()),
        "ping" => Ok(serde_json::json!({})),
        "tools/list" => Ok(handle_list_tools()),
        "tools/call" => handle_call_tool(gateway, request.params).await,
        method => {
            return Some(JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Unknown method: {method}"),
            ));
        }
    };

    Some(match result {
        Ok(value) => JsonRpcResponse::result(request.id, value),
        Err(e) => JsonRpcResponse::error(request.id, INTERNAL_ERROR, e.to_string()),
    })
}

// ============================================================================
// MCP Protocol Handlers
// ============================================================================

fn handle_initialize() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": "tiergate",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_list_tools() -> Value {
    serde_json::json!({ "tools": tool_definitions() })
}

/// Run a tool call through the gateway
async fn handle_call_tool<C: Connector>(
    gateway: &mut Gateway<C>,
    params: Option<Value>,
) -> Result<Value> {
    let params = params.ok_or_else(|| anyhow!("Missing params"))?;
    let name = params["name"].as_str().ok_or_else(|| anyhow!("Missing tool name"))?;
    let arguments = params.get("arguments");

    let response = gateway.handle(name, arguments).await;
    CallToolResult::new(&response, response.is_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_advertises_tools() {
        let value = handle_initialize();
        assert_eq!(value["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["serverInfo"]["name"], "tiergate");
        assert!(value["capabilities"]["tools"].is_object());
    }

    #[test]
    fn test_list_tools_contains_catalog() {
        let value = handle_list_tools();
        let names: Vec<&str> = value["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert!(names.contains(&"switch_environment"));
        assert!(names.contains(&"execute_query"));
        assert_eq!(names.len(), 13);
    }

    #[test]
    fn test_call_tool_result_shape() {
        let value = CallToolResult::new(&serde_json::json!({"status": "error"}), true).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["type"], "text");
        assert!(value["content"][0]["text"].as_str().unwrap().contains("\"status\""));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = JsonRpcResponse::error(Some(Value::from(7)), METHOD_NOT_FOUND, "nope".into());
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""code":-32601"#));
        assert!(json.contains(r#""id":7"#));
        assert!(!json.contains("result"));
    }
}
