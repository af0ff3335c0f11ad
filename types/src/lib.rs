//! Shared wire types for the commerce MCP gateway.
//!
//! This crate contains the JSON-RPC envelope, the MCP payloads and the tool
//! descriptor shared between the gateway and its clients.

/// Default port for the gateway.
pub const DEFAULT_PORT: u16 = 5080;

/// MCP protocol version announced by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub mod mcp;
pub mod rpc;
pub mod tool;

pub use mcp::{
    CallToolParams, CallToolResult, Content, EmptyResult, Implementation, InitializeResult,
    ListToolsResult, McpResult, ServerCapabilities, ToolCapabilities, ToolFailure,
};
pub use rpc::{
    ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, Outcome, Params, RequestId,
    JSONRPC_VERSION,
};
pub use tool::ToolDescriptor;
