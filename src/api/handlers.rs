//! HTTP handlers for the JSON-RPC endpoint

use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse};
use crate::mcp::McpServer;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Shared server state
pub struct ServerState {
    pub mcp: McpServer,
}

pub type AppState = Arc<ServerState>;

// ============================================================================
// Health check
// ============================================================================

/// Which integrations have credentials
#[derive(Serialize)]
pub struct IntegrationStatus {
    pub github: bool,
    pub jira: bool,
    pub slack: bool,
    pub google_calendar: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub integrations: IntegrationStatus,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let integrations = state.mcp.tool_handler().integrations();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        integrations: IntegrationStatus {
            github: integrations.github.is_some(),
            jira: integrations.jira.is_some(),
            slack: integrations.slack.is_some(),
            google_calendar: integrations.calendar.is_some(),
        },
    })
}

// ============================================================================
// JSON-RPC
// ============================================================================

/// `POST /mcp` (and `POST /`): one JSON-RPC request per HTTP request.
///
/// The body is parsed here rather than through the `Json` extractor so a
/// malformed body still gets a JSON-RPC shaped `-32700` reply.
pub async fn rpc(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let message: Value =
        serde_json::from_slice(&body).map_err(|e| AppError::Parse(e.to_string()))?;
    debug!(method = ?message.get("method"), "HTTP JSON-RPC request");

    Ok(match state.mcp.handle_value(message).await {
        Some(response) => Json(response).into_response(),
        // Notification
        None => StatusCode::ACCEPTED.into_response(),
    })
}

// ============================================================================
// Error handling
// ============================================================================

pub enum AppError {
    /// Body is not JSON
    Parse(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Parse(detail) => (
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error(detail)),
            ),
        };
        (status, Json(body)).into_response()
    }
}
