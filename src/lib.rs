//! devlink-mcp
//!
//! An MCP tool server exposing developer-facing remote APIs:
//! - GitHub repositories, issues, commits and pull requests
//! - JIRA projects, issues and JQL search
//! - Slack channels, history and threads
//! - Google Calendar events
//! - Cross-integration reports (PR to JIRA mapping, activity dashboard)
//!
//! Every call goes through the same pipeline: schema validation, handler,
//! response compaction, uniform result envelope.

pub mod api;
pub mod compact;
pub mod mcp;
pub mod reports;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub github: GitHubYamlConfig,
    pub jira: JiraYamlConfig,
    pub slack: SlackYamlConfig,
    pub google: GoogleYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
    /// Per-request timeout for upstream API calls
    pub upstream_timeout_secs: u64,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            upstream_timeout_secs: 30,
        }
    }
}

/// GitHub section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubYamlConfig {
    pub token: Option<String>,
    pub api_url: String,
}

impl Default for GitHubYamlConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: upstream::github::DEFAULT_API_URL.into(),
        }
    }
}

/// JIRA section. All three values are needed to enable the integration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct JiraYamlConfig {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
}

/// Slack section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackYamlConfig {
    pub bot_token: Option<String>,
    pub team_id: Option<String>,
    pub api_url: String,
}

impl Default for SlackYamlConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            team_id: None,
            api_url: upstream::slack::DEFAULT_API_URL.into(),
        }
    }
}

/// Google section (Calendar integration and the `google-auth` helper)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoogleYamlConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub token_url: String,
    pub calendar_api_url: String,
}

impl Default for GoogleYamlConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            token_url: upstream::google_oauth::GOOGLE_TOKEN_URL.into(),
            calendar_api_url: upstream::calendar::DEFAULT_API_URL.into(),
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub upstream_timeout_secs: u64,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub jira_base_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_api_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_team_id: Option<String>,
    pub slack_api_url: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_refresh_token: Option<String>,
    pub google_token_url: String,
    pub google_calendar_api_url: String,
}

/// Non-empty env var value, if any
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(name: &str, fallback: String) -> String {
    env_var(name).unwrap_or(fallback)
}

fn env_or_opt(name: &str, fallback: Option<String>) -> Option<String> {
    env_var(name).or(fallback.filter(|v| !v.trim().is_empty()))
}

fn env_parse_or<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    env_var(name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    /// Equivalent to `from_yaml_and_env(None)`
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. A missing file
    /// falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        Ok(Self {
            server_port: env_parse_or("SERVER_PORT", yaml.server.port),
            upstream_timeout_secs: env_parse_or(
                "UPSTREAM_TIMEOUT_SECS",
                yaml.server.upstream_timeout_secs,
            ),
            github_token: env_or_opt("GITHUB_TOKEN", yaml.github.token),
            github_api_url: env_or("GITHUB_API_URL", yaml.github.api_url),
            jira_base_url: env_or_opt("JIRA_BASE_URL", yaml.jira.base_url)
                .map(|url| url.trim_end_matches('/').to_string()),
            jira_email: env_or_opt("JIRA_EMAIL", yaml.jira.email),
            jira_api_token: env_or_opt("JIRA_API_TOKEN", yaml.jira.api_token),
            slack_bot_token: env_or_opt("SLACK_BOT_TOKEN", yaml.slack.bot_token),
            slack_team_id: env_or_opt("SLACK_TEAM_ID", yaml.slack.team_id),
            slack_api_url: env_or("SLACK_API_URL", yaml.slack.api_url),
            google_client_id: env_or_opt("GOOGLE_CLIENT_ID", yaml.google.client_id),
            google_client_secret: env_or_opt("GOOGLE_CLIENT_SECRET", yaml.google.client_secret),
            google_refresh_token: env_or_opt("GOOGLE_REFRESH_TOKEN", yaml.google.refresh_token),
            google_token_url: env_or("GOOGLE_TOKEN_URL", yaml.google.token_url),
            google_calendar_api_url: env_or(
                "GOOGLE_CALENDAR_API_URL",
                yaml.google.calendar_api_url,
            ),
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Resolve credentials into clients and wire the MCP server
pub fn build_server(config: &Config) -> Result<mcp::McpServer> {
    let integrations = upstream::Integrations::from_config(config)?;
    let handler = mcp::ToolHandler::new(integrations);
    Ok(mcp::McpServer::new(std::sync::Arc::new(handler)))
}

/// Serve the HTTP transport until Ctrl+C / SIGTERM
pub async fn start_server(config: Config) -> Result<()> {
    let server = build_server(&config)?;
    let state = std::sync::Arc::new(api::ServerState { mcp: server });
    let app = api::create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "MCP HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(api::shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Serve the stdio transport until stdin closes
pub async fn run_stdio(config: Config) -> Result<()> {
    build_server(&config)?.run().await
}
