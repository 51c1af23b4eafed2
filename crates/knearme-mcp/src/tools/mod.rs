//! MCP tool registry.
//!
//! Tool handlers hold the portfolio business logic; the gateway only knows
//! their call contract:
//! 1. Declare a name, description and JSON Schema once
//! 2. Receive already-validated arguments plus the caller's [`AuthContext`]
//! 3. Return structured JSON or a [`ToolError`]

mod account;

pub use account::GetAccountTool;

use std::fmt;

use serde::Serialize;

use crate::error::{ToolError, ToolResult};
use crate::server::oauth::Claims;

/// Per-request identity derived from a verified access token.
///
/// Built by the gateway for one `tools/call` and dropped with it.
#[derive(Clone)]
pub struct AuthContext {
    pub business_id: String,
    pub user_id: String,
    pub email: Option<String>,
    access_token: String,
}

impl AuthContext {
    /// Build a context from verified access-token claims and the raw token.
    #[must_use]
    pub fn from_claims(claims: Claims, access_token: impl Into<String>) -> Self {
        Self {
            business_id: claims.business_id,
            user_id: claims.sub,
            email: claims.email,
            access_token: access_token.into(),
        }
    }

    /// Raw bearer token, for handlers that call back into user-scoped APIs.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("business_id", &self.business_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Trait for MCP tools.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Tool name (e.g., "get_account").
    fn name(&self) -> &'static str;

    /// Tool description for the agent.
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool for the authenticated caller.
    async fn call(
        &self,
        ctx: &AuthContext,
        arguments: serde_json::Value,
    ) -> ToolResult<serde_json::Value>;
}

/// Catalog entry for `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Ordered, name-unique set of tool handlers. Immutable once the server starts.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler; a second handler with the same name is refused.
    pub fn register(&mut self, tool: Box<dyn ToolHandler>) -> ToolResult<()> {
        if self.get(tool.name()).is_some() {
            return Err(ToolError::internal(format!("duplicate tool name: {}", tool.name())));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: Box<dyn ToolHandler>) -> ToolResult<Self> {
        self.register(tool)?;
        Ok(self)
    }

    /// Get tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// Catalog in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tools.iter().map(|t| t.name())).finish()
    }
}

/// Check `arguments` against the top level of a tool's input schema.
///
/// Arguments must be an object and contain every name listed in the schema's
/// `required` array. Deeper validation belongs to the handler.
pub fn validate_arguments(
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> Result<(), String> {
    let Some(args) = arguments.as_object() else {
        return Err("'arguments' must be an object".to_string());
    };

    let missing: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .filter(|field| !args.contains_key(*field))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing required argument(s): {}", missing.join(", ")))
    }
}

/// Register the built-in tools.
#[must_use]
pub fn register_all_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    // Built-in names are distinct, so registration cannot collide.
    let _ = registry.register(Box::new(GetAccountTool));
    registry
}
