//! `get_account`: who the gateway thinks the caller is.

use serde_json::json;

use super::{AuthContext, ToolHandler};
use crate::error::ToolResult;

pub struct GetAccountTool;

#[async_trait::async_trait]
impl ToolHandler for GetAccountTool {
    fn name(&self) -> &'static str {
        "get_account"
    }

    fn description(&self) -> &'static str {
        "Return the business and user this connection is authorized for. \
         Call this first to confirm which contractor account you are acting on."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn call(
        &self,
        ctx: &AuthContext,
        _arguments: serde_json::Value,
    ) -> ToolResult<serde_json::Value> {
        Ok(json!({
            "business_id": ctx.business_id,
            "user_id": ctx.user_id,
            "email": ctx.email,
        }))
    }
}
