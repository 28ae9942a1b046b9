//! JSON-RPC dispatch for the MCP methods this server implements

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::Error;
use crate::error::rpc_codes;
use crate::oauth::AuthInfo;
use crate::protocol::{
    Info, InitializeParams, InitializeResult, JsonRpcResponse, RequestId, ServerCapabilities,
    ToolsCallParams, ToolsCapability, ToolsListResult, negotiate_version,
};
use crate::tools::{InvocationContext, ToolRegistry};

/// Name reported in `serverInfo`
pub const SERVER_NAME: &str = "Pangea MCP";

/// Stateless MCP request handler shared by every transport
pub struct McpServer {
    tools: ToolRegistry,
    info: Info,
}

impl McpServer {
    /// Create a server exposing `tools`
    #[must_use]
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            info: Info {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
            },
        }
    }

    /// Registered tools
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle one raw message. Returns `None` when no response is due
    /// (notifications and client responses).
    pub async fn handle_bytes(&self, bytes: &[u8], auth: Option<AuthInfo>) -> Option<JsonRpcResponse> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(message) => self.handle(message, auth).await,
            Err(e) => Some(JsonRpcResponse::error(
                None,
                rpc_codes::PARSE_ERROR,
                format!("Invalid JSON: {e}"),
            )),
        }
    }

    /// Handle one parsed message
    pub async fn handle(&self, message: Value, auth: Option<AuthInfo>) -> Option<JsonRpcResponse> {
        // A response to a server-initiated request; this server never sends any.
        if message.get("method").is_none()
            && (message.get("result").is_some() || message.get("error").is_some())
        {
            debug!("Ignoring client response");
            return None;
        }

        let (id, method, params) = match parse_request(&message) {
            Ok(parsed) => parsed,
            Err(response) => return Some(response),
        };

        let Some(id) = id else {
            debug!(notification = %method, "Notification received");
            return None;
        };

        debug!(method = %method, id = %id, "Request");
        let response = match method.as_str() {
            "initialize" => self.initialize(id, params),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.tools_list(id),
            "tools/call" => self.tools_call(id, params, auth).await,
            other => JsonRpcResponse::error(
                Some(id),
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    fn initialize(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    "Missing initialize params",
                );
            }
            Err(e) => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    format!("Invalid initialize params: {e}"),
                );
            }
        };

        let version = negotiate_version(&params.protocol_version);
        info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol = version,
            "Client initialized"
        );

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.info.clone(),
            instructions: None,
        };
        to_response(id, &result)
    }

    fn tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.tools.definitions(),
            next_cursor: None,
        };
        to_response(id, &result)
    }

    async fn tools_call(
        &self,
        id: RequestId,
        params: Option<Value>,
        auth: Option<AuthInfo>,
    ) -> JsonRpcResponse {
        let params: ToolsCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    "Missing tools/call params",
                );
            }
            Err(e) => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    format!("Invalid tools/call params: {e}"),
                );
            }
        };

        let ctx = match auth {
            Some(auth) => InvocationContext::authenticated(auth),
            None => InvocationContext::default(),
        };
        let invocation_id = ctx.invocation_id;

        match self.tools.call(&params.name, params.arguments, ctx).await {
            Ok(result) => to_response(id, &result),
            Err(e) => {
                warn!(tool = %params.name, %invocation_id, error = %e, "Tool call failed");
                error_response(id, &e)
            }
        }
    }
}

fn to_response(id: RequestId, result: &impl serde::Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(Some(id), rpc_codes::INTERNAL_ERROR, e.to_string()),
    }
}

fn error_response(id: RequestId, err: &Error) -> JsonRpcResponse {
    match err {
        Error::JsonRpc {
            code,
            message,
            data: Some(data),
        } => JsonRpcResponse::error_with_data(Some(id), *code, message.clone(), data.clone()),
        _ => JsonRpcResponse::error(Some(id), err.to_rpc_code(), err.to_string()),
    }
}

fn extract_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

/// Split a message into `(id, method, params)`; `id` is `None` for
/// notifications
#[allow(clippy::result_large_err)] // JsonRpcResponse used directly as the error reply
fn parse_request(
    value: &Value,
) -> Result<(Option<RequestId>, String, Option<Value>), JsonRpcResponse> {
    if value.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Invalid JSON-RPC version",
        ));
    }

    let id = value.get("id").and_then(extract_request_id);

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            JsonRpcResponse::error(id.clone(), rpc_codes::INVALID_REQUEST, "Missing method")
        })?;

    if id.is_none() && !method.starts_with("notifications/") {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Missing id",
        ));
    }

    Ok((id, method.to_string(), value.get("params").cloned()))
}
