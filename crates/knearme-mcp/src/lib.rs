//! KnearMe MCP Server
//!
//! OAuth 2.1 token service and Model Context Protocol gateway for the KnearMe
//! contractor portfolio. AI agents connect as OAuth clients, redeem an
//! authorization code (with PKCE) for a bearer token, and call portfolio
//! tools over JSON-RPC 2.0.
//!
//! # Features
//!
//! - **Token endpoint**: single-use authorization codes, PKCE (S256/plain),
//!   stateless HS256 access and refresh tokens with rotation
//! - **Gateway**: closed JSON-RPC method table; only `tools/call` requires a
//!   bearer token, checked on every call
//! - **Pluggable collaborators**: code store, profile store and tool handlers
//!   are traits
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use knearme_mcp::{config::Config, profile::InMemoryProfileStore, server::McpServer, tools};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let profiles = Arc::new(InMemoryProfileStore::new());
//!     let server = McpServer::new(config, profiles, tools::register_all_tools());
//!
//!     server.run_http(8000).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod profile;
pub mod resources;
pub mod server;
pub mod tools;

pub use config::Config;
pub use error::{OAuthError, StoreError, TokenError, ToolError};
pub use server::McpServer;
