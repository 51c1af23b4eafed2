//! JSON-RPC 2.0 method dispatch.
//!
//! The method table is the closed [`Method`] enum. Only `tools/call` needs a
//! bearer token, and it re-authenticates on every request; nothing survives
//! between calls.

use serde_json::{Value, json};

use super::transport::{HttpState, JsonRpcRequest, JsonRpcResponse};
use crate::config::defaults;
use crate::tools::{AuthContext, validate_arguments};

/// JSON-RPC error codes used by the gateway.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    /// Authentication failures and tool failures.
    pub const SERVER_ERROR: i32 = -32000;
    pub const RESOURCE_NOT_FOUND: i32 = -32002;
}

/// Every method the gateway answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Ping,
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesRead,
    /// Any `notifications/*` message.
    Notification,
}

impl Method {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "initialize" => Self::Initialize,
            "ping" => Self::Ping,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            "resources/list" => Self::ResourcesList,
            "resources/read" => Self::ResourcesRead,
            n if n.starts_with("notifications/") => Self::Notification,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn requires_auth(self) -> bool {
        matches!(self, Self::ToolsCall)
    }
}

/// What the transport should send back.
#[derive(Debug)]
pub enum Outcome {
    /// Normal JSON-RPC reply (success or error).
    Reply(JsonRpcResponse),
    /// `-32000` with `requiresAuth`; sent with a bearer challenge.
    AuthRequired(JsonRpcResponse),
    /// Notification accepted; no body.
    Accepted,
}

impl Outcome {
    /// The response body, if any.
    #[must_use]
    pub fn response(&self) -> Option<&JsonRpcResponse> {
        match self {
            Self::Reply(r) | Self::AuthRequired(r) => Some(r),
            Self::Accepted => None,
        }
    }
}

/// Parse and validate a request envelope.
///
/// Malformed JSON is `-32700`; a well-formed body that is not a JSON-RPC 2.0
/// request object is `-32600`.
pub fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        JsonRpcResponse::error(None, codes::PARSE_ERROR, format!("Parse error: {e}"))
    })?;

    let id = value.get("id").cloned();
    let request: JsonRpcRequest = serde_json::from_value(value).map_err(|_| {
        JsonRpcResponse::error(id.clone(), codes::INVALID_REQUEST, "Invalid Request")
    })?;

    if request.jsonrpc != JsonRpcResponse::VERSION {
        return Err(JsonRpcResponse::error(id, codes::INVALID_REQUEST, "Invalid Request"));
    }

    Ok(request)
}

/// Route one request to its method handler.
pub async fn dispatch(state: &HttpState, req: JsonRpcRequest, bearer: Option<&str>) -> Outcome {
    let is_notification = req.is_notification();

    let Some(method) = Method::from_name(&req.method) else {
        return Outcome::Reply(JsonRpcResponse::error(
            req.id,
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ));
    };

    let id = req.id;
    match method {
        Method::Initialize => {
            Outcome::Reply(JsonRpcResponse::success(id, initialize_result(&req.params)))
        }
        Method::Ping => Outcome::Reply(JsonRpcResponse::success(id, json!({}))),
        Method::Notification => {
            if is_notification {
                Outcome::Accepted
            } else {
                Outcome::Reply(JsonRpcResponse::success(id, json!({})))
            }
        }
        Method::ToolsList => Outcome::Reply(JsonRpcResponse::success(
            id,
            json!({ "tools": state.tools.definitions() }),
        )),
        Method::ResourcesList => Outcome::Reply(JsonRpcResponse::success(
            id,
            json!({ "resources": state.resources.list() }),
        )),
        Method::ResourcesRead => Outcome::Reply(read_resource(state, id, &req.params)),
        Method::ToolsCall => call_tool(state, id, &req.params, bearer).await,
    }
}

fn initialize_result(params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(|v| v.as_str())
        .unwrap_or(defaults::PROTOCOL_VERSION);

    tracing::info!("MCP initialize: protocol version {}", protocol_version);

    json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": { "listChanged": false },
            "resources": { "subscribe": false, "listChanged": false }
        },
        "serverInfo": {
            "name": "knearme-mcp",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn invalid_params(id: Option<Value>, reason: impl std::fmt::Display) -> JsonRpcResponse {
    JsonRpcResponse::error(id, codes::INVALID_PARAMS, format!("Invalid params: {reason}"))
}

fn read_resource(state: &HttpState, id: Option<Value>, params: &Value) -> JsonRpcResponse {
    let Some(uri) = params.get("uri").and_then(|v| v.as_str()) else {
        return invalid_params(id, "missing 'uri'");
    };

    match state.resources.read(uri) {
        Some(contents) => JsonRpcResponse::success(id, json!({ "contents": [contents] })),
        None => JsonRpcResponse::error_with_data(
            id,
            codes::RESOURCE_NOT_FOUND,
            "Resource not found",
            Some(json!({ "uri": uri })),
        ),
    }
}

fn auth_required(id: Option<Value>) -> Outcome {
    Outcome::AuthRequired(JsonRpcResponse::error_with_data(
        id,
        codes::SERVER_ERROR,
        "Authentication required",
        Some(json!({ "requiresAuth": true })),
    ))
}

/// Split `tools/call` params into tool name and arguments.
fn tool_call_params(params: &Value) -> Result<(&str, Value), &'static str> {
    let name = params.get("name").and_then(|v| v.as_str()).ok_or("missing 'name'")?;
    let arguments = params.get("arguments").cloned().ok_or("missing 'arguments'")?;
    Ok((name, arguments))
}

async fn call_tool(
    state: &HttpState,
    id: Option<Value>,
    params: &Value,
    bearer: Option<&str>,
) -> Outcome {
    let Some(token) = bearer else {
        tracing::debug!("tools/call without bearer token");
        return auth_required(id);
    };
    let Some(claims) = state.issuer.verify_access_token(token) else {
        return auth_required(id);
    };

    let (name, arguments) = match tool_call_params(params) {
        Ok(parts) => parts,
        Err(reason) => return Outcome::Reply(invalid_params(id, reason)),
    };

    let Some(tool) = state.tools.get(name) else {
        return Outcome::Reply(invalid_params(id, format!("Unknown tool: {name}")));
    };

    if let Err(reason) = validate_arguments(&tool.input_schema(), &arguments) {
        return Outcome::Reply(invalid_params(id, reason));
    }

    let ctx = AuthContext::from_claims(claims, token);
    tracing::info!(tool = %name, business_id = %ctx.business_id, "Executing tool");

    match tool.call(&ctx, arguments).await {
        Ok(result) => Outcome::Reply(JsonRpcResponse::success(
            id,
            json!({
                "content": [{
                    "type": "text",
                    "text": render_text(result)
                }],
                "isError": false
            }),
        )),
        Err(e) => {
            tracing::error!(tool = %name, error = %e, "Tool execution failed");
            Outcome::Reply(JsonRpcResponse::error(id, codes::SERVER_ERROR, e.to_user_message()))
        }
    }
}

/// Strings go through untouched; anything else is pretty-printed JSON.
fn render_text(result: Value) -> String {
    match result {
        Value::String(s) => s,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}
