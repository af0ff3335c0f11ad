//! MCP (Model Context Protocol) over a server-push stream.
//!
//! A client opens a long-lived `text/event-stream` and receives an `endpoint`
//! frame naming the URL it must POST its JSON-RPC requests to. Every response
//! is pushed back over that stream as a `message` frame.
//!
//! ## Endpoints
//!
//! - `GET /mcp` - Open the session stream
//! - `POST /mcp/messages?sessionId=<id>` - Submit a JSON-RPC request
//!
//! ## Session Management
//!
//! Sessions are identified by the `sessionId` query parameter, assigned when
//! the stream is opened and announced in the `endpoint` frame.

pub mod catalog;
pub mod frame;
pub mod handler;
pub mod lifecycle;
pub mod registry;
pub mod session;

pub use catalog::commerce_registry;
pub use frame::Frame;
pub use handler::McpHandler;
pub use lifecycle::{run_session, SessionGuard, StreamEnd};
pub use registry::{RegistryError, ToolAccessError, ToolRegistry};
pub use session::{
    frame_channel, FrameSink, FrameStream, McpSession, McpSessionManager, SendError,
    SessionSettings,
};
