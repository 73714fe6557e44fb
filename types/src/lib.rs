//! Shared types for the Sluice MCP server.
//!
//! This crate contains the JSON-RPC wire envelope, MCP tool types and
//! API response types shared between the server and its clients.

/// Default port for the Sluice server.
pub const DEFAULT_PORT: u16 = 3001;

/// Path of the stream-open (SSE) endpoint.
pub const SSE_PATH: &str = "/sse";

/// Path of the message-submit endpoint.
pub const MESSAGES_PATH: &str = "/messages";

/// Query parameter carrying the session identifier on message submission.
pub const SESSION_ID_PARAM: &str = "sessionId";

pub mod api;
pub mod directory;
pub mod jsonrpc;
pub mod tool;

// Re-export commonly used types
pub use api::{ErrorResponse, ServiceInfo};
pub use directory::DirectoryUser;
pub use jsonrpc::{
    EnvelopeError, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, JSONRPC_VERSION,
};
pub use tool::{ToolContent, ToolDescriptor, ToolOutput};
