//! MCP JSON-RPC request handler.
//!
//! Dispatches one request against the tool registry and the backend
//! forwarder. The handler never writes to a stream; the caller pushes the
//! returned response to the session.

use crate::auth::Identity;
use crate::state::AppState;
use commerce_mcp_types::{
    CallToolParams, CallToolResult, EmptyResult, ErrorCode, Implementation, InitializeResult,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, Params, RequestId,
    ServerCapabilities, ToolCapabilities, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Name announced in `initialize`.
pub const SERVER_NAME: &str = "commerce-mcp";

/// MCP request handler.
pub struct McpHandler;

impl McpHandler {
    /// Handle an MCP JSON-RPC request on behalf of `identity`.
    ///
    /// Returns `None` for notifications, which never get a response.
    pub async fn handle_request(
        state: &AppState,
        identity: &Identity,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        if request.is_notification() || request.method.starts_with("notifications/") {
            debug!("MCP: Notification {}", request.method);
            return None;
        }

        let id = request.id.clone();
        debug!("MCP: Handling method: {}", request.method);

        match request.method.as_str() {
            "initialize" => Some(Self::handle_initialize(id)),
            "ping" => Some(JsonRpcResponse::success(id, EmptyResult::default())),
            "tools/list" => Some(Self::handle_list_tools(state, identity, id)),
            "tools/call" => {
                Some(Self::handle_call_tool(state, identity, id, request.params).await)
            }
            other => {
                warn!("MCP: Unknown method: {}", other);
                Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::method_not_found(other),
                ))
            }
        }
    }

    /// Turn a raw request body into a request, or into the error to push back.
    ///
    /// A broken envelope that carries a method but no id is a notification,
    /// so it yields `Err(None)` and nothing is pushed.
    pub fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, Option<JsonRpcResponse>> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            warn!("MCP: Unparseable request body: {}", e);
            Some(JsonRpcResponse::error(
                None,
                JsonRpcError::new(ErrorCode::ParseError, format!("Parse error: {}", e)),
            ))
        })?;

        // Keep the id when only the rest of the envelope is broken.
        let id = value
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
        let notification = value.get("method").is_some() && value.get("id").is_none();
        let invalid = |message: String| {
            warn!("MCP: Invalid request envelope: {}", message);
            (!notification).then(|| {
                JsonRpcResponse::error(
                    id.clone(),
                    JsonRpcError::new(
                        ErrorCode::InvalidRequest,
                        format!("Invalid Request: {}", message),
                    ),
                )
            })
        };

        let request = serde_json::from_value::<JsonRpcRequest>(value)
            .map_err(|e| invalid(e.to_string()))?;
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(invalid(format!(
                "unsupported jsonrpc version '{}'",
                request.jsonrpc
            )));
        }
        Ok(request)
    }

    /// Handle the initialize request.
    fn handle_initialize(id: Option<RequestId>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: ToolCapabilities {
                        list: true,
                        call: true,
                    },
                },
                server_info: Implementation {
                    name: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            },
        )
    }

    /// Handle the tools/list request.
    fn handle_list_tools(
        state: &AppState,
        identity: &Identity,
        id: Option<RequestId>,
    ) -> JsonRpcResponse {
        let tools = state.registry().list_for(identity);
        JsonRpcResponse::success(id, ListToolsResult { tools })
    }

    /// Handle the tools/call request.
    async fn handle_call_tool(
        state: &AppState,
        identity: &Identity,
        id: Option<RequestId>,
        params: Option<Params>,
    ) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params("Missing 'params' object for tools/call"),
            );
        };

        let call = match serde_json::from_value::<CallToolParams>(Value::Object(params)) {
            Ok(call) if !call.name.is_empty() => call,
            Ok(_) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(
                        "Invalid parameters format or missing tool name: empty name",
                    ),
                )
            }
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!(
                        "Invalid parameters format or missing tool name: {}",
                        e
                    )),
                )
            }
        };

        let registry = state.registry();
        let access = if state.enforce_call_roles() {
            registry.authorize(&call.name, identity).map(|_| ())
        } else {
            registry.resolve(&call.name).map(|_| ())
        };
        if let Err(e) = access {
            warn!("MCP: Refusing tool call '{}': {}", call.name, e);
            return JsonRpcResponse::error(
                id,
                JsonRpcError::internal(format!("Tool execution failed: {}", e)),
            );
        }

        let arguments = call.arguments.unwrap_or_default();
        info!("MCP: Calling tool {}", call.name);
        match state
            .forwarder()
            .forward(&call.name, &arguments, &identity.bearer_token)
            .await
        {
            Ok(response) if response.success => {
                JsonRpcResponse::success(id, CallToolResult::text(response.body))
            }
            Ok(response) => JsonRpcResponse::success(id, CallToolResult::failure(response.body)),
            Err(e) => {
                error!("MCP: Tool {} failed: {}", call.name, e);
                JsonRpcResponse::error(
                    id,
                    JsonRpcError::internal(format!("Tool execution failed: {}", e)),
                )
            }
        }
    }
}
