//! MCP (Model Context Protocol) server implementation
//!
//! Exposes the GitHub, JIRA, Slack and Google Calendar integrations as MCP
//! tools over stdio or HTTP.

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod validate;

pub use handlers::{DispatchError, ToolHandler};
pub use protocol::*;
pub use server::McpServer;
