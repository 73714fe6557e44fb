//! MCP (Model Context Protocol) over HTTP+SSE.
//!
//! A client opens a long-lived event stream with `GET /sse` and receives an
//! `endpoint` event naming the URL it must POST its JSON-RPC messages to.
//! Replies are pushed back over the stream as `message` events.
//!
//! ## Pieces
//!
//! - [`session`] - session identity and the registry of open sessions
//! - [`transport`] - the per-session SSE transport and its outbound queue
//! - [`handler`] - JSON-RPC method dispatch (`initialize`, `tools/*`, ...)

pub mod handler;
pub mod session;
pub mod transport;

pub use handler::{McpHandler, MessageHandler};
pub use session::{RegistryError, Session, SessionRegistry};
pub use transport::{
    Delivery, Frame, InboundTransport, SessionStream, SseTransport, Transport, TransportError,
    TransportState,
};
