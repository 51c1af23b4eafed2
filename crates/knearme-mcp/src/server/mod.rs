//! MCP server implementation.
//!
//! A single HTTP listener serves the OAuth token endpoint and the JSON-RPC
//! gateway. Everything request-scoped lives in [`transport::HttpState`];
//! the server owns it and the background code sweeper.

pub mod gateway;
pub mod oauth;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use crate::config::Config;
use crate::profile::ProfileStore;
use crate::tools::ToolRegistry;
use oauth::{AuthCodeStore, InMemoryAuthCodeStore};
use transport::HttpState;

/// KnearMe MCP server.
pub struct McpServer {
    state: Arc<HttpState>,

    /// Set when codes live in this process and need periodic purging.
    sweeper: Option<Arc<InMemoryAuthCodeStore>>,
}

impl McpServer {
    /// Create a server with an in-process authorization code store.
    #[must_use]
    pub fn new(config: Config, profiles: Arc<dyn ProfileStore>, tools: ToolRegistry) -> Self {
        let codes = Arc::new(InMemoryAuthCodeStore::with_lifetime(config.auth_code_ttl));
        let mut server = Self::with_code_store(config, codes.clone(), profiles, tools);
        server.sweeper = Some(codes);
        server
    }

    /// Create a server around an externally owned code store.
    #[must_use]
    pub fn with_code_store(
        config: Config,
        codes: Arc<dyn AuthCodeStore>,
        profiles: Arc<dyn ProfileStore>,
        tools: ToolRegistry,
    ) -> Self {
        let state = HttpState::new(config, codes, profiles, tools);
        Self {
            state: Arc::new(state),
            sweeper: None,
        }
    }

    /// The authorization code store; the consent flow issues codes into it.
    #[must_use]
    pub fn code_store(&self) -> Arc<dyn AuthCodeStore> {
        Arc::clone(&self.state.codes)
    }

    /// Build the HTTP router.
    #[must_use]
    pub fn router(&self) -> Router {
        transport::create_router(Arc::clone(&self.state))
    }

    /// Run the server in HTTP mode.
    ///
    /// # Errors
    ///
    /// Returns error on server failure.
    pub async fn run_http(self, port: u16) -> anyhow::Result<()> {
        tracing::info!("Starting MCP server in HTTP mode on port {}", port);
        tracing::info!(
            tools = self.state.tools.len(),
            rotation_ledger = self.state.ledger.is_some(),
            base_url = %self.state.config.base_url,
            "Server configured"
        );

        if let Some(codes) = &self.sweeper {
            Arc::clone(codes).start_cleanup_task();
        }

        let router = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer").field("state", &self.state).finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
