//! MCP Server implementation
//!
//! JSON-RPC 2.0 method routing shared by both transports. [`McpServer::run`]
//! serves newline-delimited frames over stdio; the HTTP transport calls
//! [`McpServer::handle_value`] per request.

use super::handlers::{DispatchError, ToolHandler};
use super::protocol::*;
use super::tools::tool_definitions;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "devlink-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP Server that handles JSON-RPC 2.0 requests
#[derive(Clone)]
pub struct McpServer {
    tool_handler: Arc<ToolHandler>,
}

impl McpServer {
    pub fn new(tool_handler: Arc<ToolHandler>) -> Self {
        Self { tool_handler }
    }

    pub fn tool_handler(&self) -> &ToolHandler {
        &self.tool_handler
    }

    /// Run the server, reading from stdin and writing to stdout
    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        info!("MCP server starting on stdio");

        loop {
            let line = match lines.next_line().await {
                Ok(Some(l)) => l,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read line: {}", e);
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            if let Some(resp) = self.handle_message(&line).await {
                let json = serde_json::to_string(&resp)?;
                debug!("Sending: {}", json);
                stdout.write_all(json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        info!("MCP server shutting down");
        Ok(())
    }

    /// Handle a single raw JSON-RPC frame
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(message) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => Some(JsonRpcResponse::error(
                Value::Null,
                JsonRpcError::parse_error(e.to_string()),
            )),
        }
    }

    /// Handle an already-parsed JSON-RPC message. Notifications yield `None`.
    pub async fn handle_value(&self, message: Value) -> Option<JsonRpcResponse> {
        // `"id": null` is still a request; only a missing id marks a notification
        let has_id = message.get("id").is_some();
        let fallback_id = message.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    fallback_id,
                    JsonRpcError::invalid_request(e.to_string()),
                ));
            }
        };

        if !has_id {
            self.handle_notification(&request);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        Some(match self.handle_request(&request).await {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                info!("Client confirmed initialization");
            }
            "notifications/cancelled" => {
                warn!("Request cancelled by client");
            }
            _ => {
                debug!("Unknown notification: {}", request.method);
            }
        }
    }

    /// Route a request to its method
    pub async fn handle_request(&self, request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "ping" => Ok(json!({})),
            "tools/list" | "listTools" => self.handle_tools_list(),
            "tools/call" | "callTool" => self.handle_tools_call(&request.params).await,

            // No resources are exposed
            "resources/list" | "listResources" => Ok(json!({"resources": []})),
            "resources/templates/list" | "listResourceTemplates" => {
                Ok(json!({"resourceTemplates": []}))
            }
            "resources/read" | "readResource" => Ok(json!({"contents": []})),

            _ => Err(JsonRpcError::method_not_found(&request.method)),
        }
    }

    fn handle_initialize(&self, params: &Option<Value>) -> Result<Value, JsonRpcError> {
        let params: Option<InitializeParams> = params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;

        if let Some(ref params) = params {
            info!(
                "Initializing MCP server (client protocol: {})",
                params.protocol_version
            );
            if let Some(ref client) = params.client_info {
                info!(
                    "Client: {} v{}",
                    client.name,
                    client.version.as_deref().unwrap_or("unknown")
                );
            }
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
                resources: ResourcesCapability {
                    subscribe: false,
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        let result = ToolsListResult {
            tools: tool_definitions(),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    async fn handle_tools_call(&self, params: &Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = params
            .as_ref()
            .ok_or_else(|| JsonRpcError::invalid_params("params required"))?
            .clone()
            .pipe(serde_json::from_value)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;

        info!("Tool call: {}", params.name);

        let tool_result = self
            .tool_handler
            .call(&params.name, params.arguments)
            .await
            .map_err(|e| match e {
                DispatchError::InvalidParams(inner) => {
                    warn!(tool = %params.name, "Invalid params: {}", inner);
                    JsonRpcError::invalid_params(inner.to_string())
                }
            })?;

        serde_json::to_value(tool_result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }
}

/// Extension trait for pipe operator
trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}
