//! HTTP transport.
//!
//! One axum router carries both halves of the service:
//! - `POST /token` and the OAuth discovery documents
//! - `POST /mcp` for JSON-RPC, `GET /mcp` for a static status document
//!
//! Handlers here only adapt HTTP to the gateway and token endpoint; the
//! protocol decisions live in [`super::gateway`] and [`super::oauth::handlers`].

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::gateway::{self, Outcome};
use super::oauth::{AuthCodeStore, RotationLedger, TokenIssuer, handlers as oauth};
use crate::config::{Config, defaults};
use crate::profile::ProfileStore;
use crate::resources::{self, ResourceCatalog};
use crate::tools::ToolRegistry;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// `None` only when the member is absent; an explicit `null` is `Some(Null)`.
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// A notification carries no `id` member at all.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

fn present_id<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    /// Echoed request id; `null` when the request id could not be read.
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    /// JSON-RPC version constant.
    pub const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            id: id.unwrap_or(serde_json::Value::Null),
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self::error_with_data(id, code, message, None)
    }

    #[must_use]
    pub fn error_with_data(
        id: Option<serde_json::Value>,
        code: i32,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            id: id.unwrap_or(serde_json::Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }

    /// Error code, if this is an error response.
    #[must_use]
    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub config: Config,
    pub issuer: TokenIssuer,
    pub codes: Arc<dyn AuthCodeStore>,
    pub profiles: Arc<dyn ProfileStore>,
    /// Present when rotated refresh tokens must not be redeemed twice.
    pub ledger: Option<RotationLedger>,
    pub tools: ToolRegistry,
    pub resources: ResourceCatalog,
}

impl HttpState {
    /// Wire the collaborators together. The signing key is taken from `config`.
    #[must_use]
    pub fn new(
        config: Config,
        codes: Arc<dyn AuthCodeStore>,
        profiles: Arc<dyn ProfileStore>,
        tools: ToolRegistry,
    ) -> Self {
        let issuer = TokenIssuer::new(&config.signing_key);
        let ledger = config.rotation_ledger.then(|| RotationLedger::new(config.refresh_token_ttl));
        Self {
            config,
            issuer,
            codes,
            profiles,
            ledger,
            tools,
            resources: resources::default_catalog(),
        }
    }

    /// URL of the RFC 9728 protected-resource document.
    #[must_use]
    pub fn resource_metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-protected-resource", self.config.base_url)
    }
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpState")
            .field("config", &self.config)
            .field("tools", &self.tools)
            .field("rotation_ledger", &self.ledger.is_some())
            .finish()
    }
}

/// Create the HTTP router.
pub fn create_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/mcp", post(handle_mcp_post).get(health_check))
        .route("/token", post(oauth::handle_token))
        .route("/.well-known/oauth-authorization-server", get(oauth::handle_auth_server_metadata))
        .route("/.well-known/oauth-protected-resource", get(oauth::handle_protected_resource))
        .layer(GlobalConcurrencyLimitLayer::new(defaults::MAX_CONCURRENT_REQUESTS))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "knearme-mcp",
        "version": env!("CARGO_PKG_VERSION"),
        "transport": "streamable-http",
        "auth": "oauth2"
    }))
}

/// Handle POST requests to /mcp.
async fn handle_mcp_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match gateway::parse_request(&body) {
        Ok(request) => request,
        Err(response) => return (StatusCode::BAD_REQUEST, Json(response)).into_response(),
    };

    tracing::debug!(method = %request.method, "Handling MCP POST request");

    let bearer = bearer_token(&headers);

    match gateway::dispatch(&state, request, bearer).await {
        Outcome::Reply(response) => Json(response).into_response(),
        Outcome::Accepted => StatusCode::ACCEPTED.into_response(),
        Outcome::AuthRequired(response) => {
            let mut res = (StatusCode::UNAUTHORIZED, Json(response)).into_response();
            let challenge =
                format!("Bearer resource_metadata=\"{}\"", state.resource_metadata_url());
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                res.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
            res
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively; anything else (missing header,
/// other scheme, empty or space-containing token) yields `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers_with("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers_with("Bearer")), None);
        assert_eq!(bearer_token(&headers_with("Bearer   ")), None);
        assert_eq!(bearer_token(&headers_with("Bearer a b")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_response_always_has_id() {
        let response = JsonRpcResponse::error(None, -32700, "Parse error");
        let value = serde_json::to_value(response).unwrap();
        assert!(value.get("id").unwrap().is_null());
        assert_eq!(value["jsonrpc"], "2.0");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_success_shape() {
        let response = JsonRpcResponse::success(Some(serde_json::json!(7)), serde_json::json!({}));
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["id"], 7);
        assert!(value.get("error").is_none());
    }
}
