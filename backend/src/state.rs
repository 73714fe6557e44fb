//! Application state management.

use std::sync::Arc;
use std::time::Duration;

use crate::mcp::{McpHandler, MessageHandler, SessionRegistry};
use crate::tools::ToolRegistry;

/// Per-session transport settings.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Outbound frames buffered per session.
    pub queue_capacity: usize,
    /// Interval between SSE keep-alive comments.
    pub keep_alive: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            keep_alive: Duration::from_secs(15),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Open MCP sessions
    sessions: SessionRegistry,
    /// Handler installed on every new transport
    handler: Arc<dyn MessageHandler>,
    /// Transport settings for new sessions
    transport: TransportSettings,
}

impl AppState {
    pub fn new(handler: Arc<dyn MessageHandler>, transport: TransportSettings) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                sessions: SessionRegistry::new(),
                handler,
                transport,
            }),
        }
    }

    /// State serving the given tools through the MCP handler.
    pub fn with_tools(tools: ToolRegistry, transport: TransportSettings) -> Self {
        Self::new(Arc::new(McpHandler::new(Arc::new(tools))), transport)
    }

    /// Get the session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// Get the message handler for new sessions.
    pub fn handler(&self) -> Arc<dyn MessageHandler> {
        self.inner.handler.clone()
    }

    pub fn transport_settings(&self) -> &TransportSettings {
        &self.inner.transport
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_tools(ToolRegistry::new(), TransportSettings::default())
    }
}
