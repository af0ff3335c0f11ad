//! MCP payload types carried inside JSON-RPC envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tool::ToolDescriptor;

/// Result payload of a successful response.
///
/// Each method produces one known shape; `Empty` covers methods like `ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpResult {
    Initialize(InitializeResult),
    ListTools(ListToolsResult),
    CallTool(CallToolResult),
    Empty(EmptyResult),
}

impl From<InitializeResult> for McpResult {
    fn from(value: InitializeResult) -> Self {
        McpResult::Initialize(value)
    }
}

impl From<ListToolsResult> for McpResult {
    fn from(value: ListToolsResult) -> Self {
        McpResult::ListTools(value)
    }
}

impl From<CallToolResult> for McpResult {
    fn from(value: CallToolResult) -> Self {
        McpResult::CallTool(value)
    }
}

impl From<EmptyResult> for McpResult {
    fn from(value: EmptyResult) -> Self {
        McpResult::Empty(value)
    }
}

/// `{}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyResult {}

/// Result of `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolCapabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCapabilities {
    pub list: bool,
    pub call: bool,
}

/// Name and version of this server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}

/// Params of `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

/// One content item of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Result of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<Content>,
}

impl CallToolResult {
    /// Wrap a raw backend response body.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
        }
    }

    /// Wrap an execution failure as a structured payload.
    pub fn failure(message: impl Into<String>) -> Self {
        let payload = ToolFailure {
            error: "ToolExecutionFailure".to_string(),
            message: message.into(),
        };
        // Serializing two plain strings cannot fail.
        let text = serde_json::to_string(&payload).unwrap_or_default();
        Self::text(text)
    }
}

/// Structured error payload placed inside a tool result's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_result_uses_camel_case() {
        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: ServerCapabilities {
                tools: ToolCapabilities {
                    list: true,
                    call: true,
                },
            },
            server_info: Implementation {
                name: "commerce-mcp".to_string(),
                version: "1.0".to_string(),
            },
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["protocolVersion"], "2024-11-05");
        assert_eq!(value["serverInfo"]["name"], "commerce-mcp");
        assert_eq!(value["capabilities"]["tools"], json!({"list": true, "call": true}));
    }

    #[test]
    fn test_failure_payload_shape() {
        let result = CallToolResult::failure("Missing productId");
        assert_eq!(result.content.len(), 1);
        assert_eq!(result.content[0].kind, "text");
        let payload: ToolFailure = serde_json::from_str(&result.content[0].text).unwrap();
        assert_eq!(payload.error, "ToolExecutionFailure");
        assert_eq!(payload.message, "Missing productId");
    }

    #[test]
    fn test_call_params_without_arguments() {
        let params: CallToolParams =
            serde_json::from_value(json!({"name": "list_products"})).unwrap();
        assert_eq!(params.name, "list_products");
        assert!(params.arguments.is_none());
    }

    #[test]
    fn test_empty_result_deserializes_as_empty() {
        let result: McpResult = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(result, McpResult::Empty(_)));
    }
}
