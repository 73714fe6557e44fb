//! MCP JSON-RPC request handler.
//!
//! Handles MCP protocol methods and routes tool calls to the tool registry.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sluice_types::{JsonRpcError, JsonRpcNotification, JsonRpcRequest};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::tools::{ToolCallError, ToolRegistry};

/// MCP protocol version we support (HTTP+SSE transport revision).
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "sluice";

/// Receives every JSON-RPC message routed to a session.
///
/// Implementations are treated as untrusted by the transport: errors and
/// panics are turned into JSON-RPC error frames and never close the session.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a request. The transport wraps the outcome in a response
    /// carrying the request id.
    async fn handle_request(
        &self,
        session_id: &str,
        request: JsonRpcRequest,
    ) -> Result<Value, JsonRpcError>;

    /// Handle a notification. Nothing is sent back.
    async fn handle_notification(&self, session_id: &str, notification: JsonRpcNotification) {
        debug!(
            "MCP session {}: ignoring notification {}",
            session_id, notification.method
        );
    }
}

/// Tool call parameters from MCP.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// MCP request handler backed by a tool registry.
pub struct McpHandler {
    tools: Arc<ToolRegistry>,
}

impl McpHandler {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    /// The registry this handler dispatches to.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle the initialize request.
    fn handle_initialize(params: Option<&Value>) -> Value {
        if let Some(requested) = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
        {
            if requested != PROTOCOL_VERSION {
                debug!(
                    "MCP: client requested protocol {}, answering with {}",
                    requested, PROTOCOL_VERSION
                );
            }
        }

        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    /// Handle the tools/list request.
    fn handle_list_tools(&self) -> Value {
        json!({ "tools": self.tools.descriptors() })
    }

    /// Handle the tools/call request.
    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = serde_json::from_value(params.unwrap_or(json!({})))
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)))?;

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        match self.tools.call(&params.name, arguments).await {
            Ok(output) => serde_json::to_value(output)
                .map_err(|e| JsonRpcError::internal_error(format!("Failed to encode tool output: {}", e))),
            Err(ToolCallError::UnknownTool(name)) => Err(JsonRpcError::invalid_params(format!(
                "Tool {} not found",
                name
            ))),
            Err(ToolCallError::InvalidArguments(reason)) => Err(JsonRpcError::invalid_params(
                format!("Invalid arguments for tool {}: {}", params.name, reason),
            )),
            Err(ToolCallError::Failed(reason)) => {
                warn!("MCP: tool {} failed: {}", params.name, reason);
                Err(JsonRpcError::internal_error(format!(
                    "Tool call failed: {}",
                    reason
                )))
            }
        }
    }
}

#[async_trait]
impl MessageHandler for McpHandler {
    async fn handle_request(
        &self,
        session_id: &str,
        request: JsonRpcRequest,
    ) -> Result<Value, JsonRpcError> {
        debug!("MCP session {}: handling method {}", session_id, request.method);

        match request.method.as_str() {
            "initialize" => Ok(Self::handle_initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.handle_list_tools()),
            "tools/call" => self.handle_call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    async fn handle_notification(&self, session_id: &str, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => {
                info!("MCP session {} initialized", session_id);
            }
            "notifications/cancelled" => {
                debug!(
                    "MCP session {}: client cancelled {:?}",
                    session_id, notification.params
                );
            }
            other => debug!("MCP session {}: ignoring notification {}", session_id, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{handler_fn, register_tools, ToolDefinition, ToolError};
    use sluice_types::jsonrpc::error_codes;
    use sluice_types::ToolOutput;

    fn handler() -> McpHandler {
        let mut registry = ToolRegistry::new();
        let report = register_tools(
            &mut registry,
            vec![
                (
                    "shout".to_string(),
                    ToolDefinition::new(
                        "shout",
                        json!({
                            "type": "object",
                            "properties": { "text": { "type": "string" } },
                            "required": ["text"]
                        }),
                        handler_fn(|args: Value| async move {
                            let text = args
                                .get("text")
                                .and_then(Value::as_str)
                                .ok_or_else(|| ToolError::InvalidArguments("text is required".into()))?;
                            Ok(ToolOutput::text(text.to_uppercase()))
                        }),
                    )
                    .with_description("Upper-case some text"),
                ),
                (
                    "broken".to_string(),
                    ToolDefinition::new(
                        "broken",
                        json!({"type": "object"}),
                        handler_fn(|_args: Value| async move {
                            Err(ToolError::Failed("upstream unavailable".into()))
                        }),
                    ),
                ),
            ],
        );
        assert_eq!(report.registered, 2);
        McpHandler::new(Arc::new(registry))
    }

    async fn call(handler: &McpHandler, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        handler
            .handle_request("test-session", JsonRpcRequest::new(1, method, params))
            .await
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let result = call(&handler(), "initialize", Some(json!({"protocolVersion": "2025-03-26"})))
            .await
            .unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_ping() {
        assert_eq!(call(&handler(), "ping", None).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_tools_list_in_registration_order() {
        let result = call(&handler(), "tools/list", None).await.unwrap();
        let names: Vec<&str> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["shout", "broken"]);
        assert_eq!(result["tools"][0]["description"], "Upper-case some text");
        assert_eq!(result["tools"][0]["inputSchema"]["required"][0], "text");
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let result = call(
            &handler(),
            "tools/call",
            Some(json!({"name": "shout", "arguments": {"text": "hi"}})),
        )
        .await
        .unwrap();
        assert_eq!(result["content"][0]["text"], "HI");
    }

    #[tokio::test]
    async fn test_tools_call_errors() {
        let h = handler();

        let unknown = call(&h, "tools/call", Some(json!({"name": "nope"})))
            .await
            .unwrap_err();
        assert_eq!(unknown.code, error_codes::INVALID_PARAMS);

        let bad_args = call(&h, "tools/call", Some(json!({"name": "shout", "arguments": {}})))
            .await
            .unwrap_err();
        assert_eq!(bad_args.code, error_codes::INVALID_PARAMS);

        let missing_name = call(&h, "tools/call", Some(json!({"arguments": {}})))
            .await
            .unwrap_err();
        assert_eq!(missing_name.code, error_codes::INVALID_PARAMS);

        let failed = call(&h, "tools/call", Some(json!({"name": "broken"})))
            .await
            .unwrap_err();
        assert_eq!(failed.code, error_codes::INTERNAL_ERROR);
        assert!(failed.message.contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let err = call(&handler(), "resources/list", None).await.unwrap_err();
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
    }
}
