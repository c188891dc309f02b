//! devlink - MCP tool server for GitHub, JIRA, Slack and Google Calendar

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use devlink_mcp::upstream::google_oauth::{self, GoogleAuthFlow, CALLBACK_PATH};
use devlink_mcp::upstream::http_client;
use devlink_mcp::Config;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "devlink")]
#[command(about = "MCP tool server bridging GitHub, JIRA, Slack and Google Calendar")]
#[command(version)]
struct Cli {
    /// YAML config file (defaults to ./config.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-RPC over HTTP
    Serve {
        /// Port to listen on (overrides SERVER_PORT / config.yaml)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Serve JSON-RPC over stdin/stdout
    Stdio,

    /// Obtain a Google refresh token for the Calendar integration
    GoogleAuth {
        /// Local port for the OAuth redirect
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // stdout belongs to the protocol in stdio mode
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,devlink_mcp=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match cli.command {
        Commands::Stdio => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            devlink_mcp::start_server(config).await
        }
        Commands::Stdio => devlink_mcp::run_stdio(config).await,
        Commands::GoogleAuth { port } => run_google_auth(config, port).await,
    }
}

async fn run_google_auth(config: Config, port: u16) -> Result<()> {
    let (Some(client_id), Some(client_secret)) =
        (&config.google_client_id, &config.google_client_secret)
    else {
        bail!("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set");
    };

    let redirect_uri = format!("http://localhost:{}{}", port, CALLBACK_PATH);
    let flow = GoogleAuthFlow::new(
        client_id,
        client_secret,
        &redirect_uri,
        &config.google_token_url,
        http_client(Duration::from_secs(config.upstream_timeout_secs))?,
    );

    println!("Open this URL in your browser to authorize Google Calendar access:\n");
    println!("{}\n", flow.auth_url());

    let code = google_oauth::receive_code(port).await?;
    let token = flow.exchange_code(&code).await?;

    match token.refresh_token {
        Some(refresh) => {
            println!("Refresh token:\n\n{}\n", refresh);
            println!("Store it as GOOGLE_REFRESH_TOKEN in .env or config.yaml (google.refresh_token).");
            Ok(())
        }
        None => bail!(
            "Google did not return a refresh token; revoke the app's access and run again"
        ),
    }
}
