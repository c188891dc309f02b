//! MCP Server Binary
//!
//! Runs devlink as an MCP server over stdio, for MCP client configuration.
//!
//! # Usage
//!
//! ```bash
//! # Run directly
//! ./mcp_server
//!
//! # With credentials from the environment
//! GITHUB_TOKEN=ghp_xxx SLACK_BOT_TOKEN=xoxb-xxx ./mcp_server
//!
//! # With debug logging
//! RUST_LOG=debug ./mcp_server
//! ```
//!
//! # Client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "devlink": {
//!       "command": "/path/to/mcp_server",
//!       "env": {
//!         "GITHUB_TOKEN": "ghp_xxx",
//!         "JIRA_BASE_URL": "https://your-domain.atlassian.net",
//!         "JIRA_EMAIL": "you@example.com",
//!         "JIRA_API_TOKEN": "xxx",
//!         "SLACK_BOT_TOKEN": "xoxb-xxx",
//!         "GOOGLE_CLIENT_ID": "xxx.apps.googleusercontent.com",
//!         "GOOGLE_CLIENT_SECRET": "xxx",
//!         "GOOGLE_REFRESH_TOKEN": "xxx"
//!       }
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use clap::Parser;
use devlink_mcp::Config;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// MCP Server for devlink
#[derive(Parser, Debug)]
#[command(name = "mcp_server")]
#[command(about = "MCP server exposing GitHub, JIRA, Slack and Google Calendar tools")]
#[command(version)]
struct Args {
    /// YAML config file
    #[arg(long, env = "DEVLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Upstream request timeout in seconds (overrides config)
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize logging (to stderr to keep stdout clean for MCP)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("devlink_mcp=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = Config::from_yaml_and_env(args.config.as_deref())?;
    if let Some(secs) = args.timeout_secs {
        config.upstream_timeout_secs = secs;
    }

    info!("Starting devlink MCP server");
    info!("Upstream timeout: {}s", config.upstream_timeout_secs);

    if let Err(e) = devlink_mcp::run_stdio(config).await {
        error!("MCP server error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
