//! KnearMe MCP Server - Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use knearme_mcp::{
    config::Config,
    profile::{InMemoryProfileStore, ProfileStore, RestProfileStore},
    server::McpServer,
    tools,
};

#[derive(Parser, Debug)]
#[command(name = "knearme-mcp")]
#[command(about = "OAuth 2.1 token service and MCP gateway for the KnearMe portfolio")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Public base URL announced in discovery documents (e.g., https://mcp.knearme.com)
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Profile REST API base URL (PostgREST); in-memory profiles when unset
    #[arg(long, env = "KNEARME_MCP_PROFILE_API_URL")]
    profile_api_url: Option<String>,

    /// Service key for the profile REST API
    #[arg(long, env = "KNEARME_MCP_PROFILE_API_KEY", hide_env_values = true)]
    profile_api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting KnearMe MCP server");

    let mut config = Config::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url)?;
    }

    let profiles: Arc<dyn ProfileStore> = match cli.profile_api_url.as_deref() {
        Some(url) => {
            tracing::info!(url, "Using REST profile store");
            Arc::new(RestProfileStore::new(url, cli.profile_api_key)?)
        }
        None => {
            tracing::warn!(
                "No profile API configured; refresh grants will fail for unknown subjects"
            );
            Arc::new(InMemoryProfileStore::new())
        }
    };

    let server = McpServer::new(config, profiles, tools::register_all_tools());
    server.run_http(cli.port).await
}
