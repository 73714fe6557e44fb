//! MCP session management.
//!
//! A session is one open SSE stream. Sessions are identified by random
//! UUIDs and live exactly as long as their transport stays open; the
//! registry only holds a lookup entry that the transport removes when it
//! closes.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::transport::Transport;

/// An MCP session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// When the session was created.
    pub created_at: Instant,
}

impl Session {
    /// Create a new session with a fresh random ID.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Instant::now(),
        }
    }

    /// Get the session age in seconds.
    pub fn age_secs(&self) -> u64 {
        self.created_at.elapsed().as_secs()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Session id collision: {0}")]
    DuplicateSession(String),

    #[error("Server is shutting down")]
    ShuttingDown,
}

/// Registry of open sessions, keyed by session id.
///
/// Uses a synchronous lock so that entries can be dropped from `Drop`
/// implementations when a connection goes away. The lock is never held
/// across an await point.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<String, Arc<dyn Transport>>,
    /// Set by `close_all`; no session may register afterwards.
    closed: bool,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport under `id`. Never overwrites an existing entry.
    pub fn register(&self, id: &str, transport: Arc<dyn Transport>) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        if inner.closed {
            warn!("Refusing to register MCP session {} during shutdown", id);
            return Err(RegistryError::ShuttingDown);
        }
        if inner.sessions.contains_key(id) {
            warn!("Refusing to register duplicate MCP session id: {}", id);
            return Err(RegistryError::DuplicateSession(id.to_string()));
        }
        inner.sessions.insert(id.to_string(), transport);
        info!("Registered MCP session: {} (open: {})", id, inner.sessions.len());
        Ok(())
    }

    /// Look up the transport for a session.
    pub fn lookup(&self, id: &str) -> Option<Arc<dyn Transport>> {
        self.inner.read().sessions.get(id).cloned()
    }

    /// Remove a session entry. Returns whether an entry was removed.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.inner.write().sessions.remove(id).is_some();
        if removed {
            debug!("Removed MCP session: {}", id);
        }
        removed
    }

    /// Remove `id` only if it still maps to `transport`.
    ///
    /// Used by a closing transport so it can never evict an entry that
    /// belongs to a different transport.
    pub(crate) fn release(&self, id: &str, transport: &(dyn Transport + 'static)) -> bool {
        let mut inner = self.inner.write();
        let owned = inner.sessions.get(id).is_some_and(|entry| {
            std::ptr::addr_eq(Arc::as_ptr(entry), transport as *const dyn Transport)
        });
        if owned {
            inner.sessions.remove(id);
            debug!("Released MCP session: {} (open: {})", id, inner.sessions.len());
        }
        owned
    }

    /// Check if a session exists.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().sessions.contains_key(id)
    }

    /// Get the number of open sessions.
    pub fn session_count(&self) -> usize {
        self.inner.read().sessions.len()
    }

    /// Close every registered transport and refuse new registrations.
    /// Used on server shutdown.
    pub fn close_all(&self) -> usize {
        let transports: Vec<(String, Arc<dyn Transport>)> = {
            let mut inner = self.inner.write();
            inner.closed = true;
            inner
                .sessions
                .iter()
                .map(|(id, transport)| (id.clone(), transport.clone()))
                .collect()
        };
        let count = transports.len();
        for (id, transport) in transports {
            transport.close();
            // Sweeps entries whose transport was already closing.
            self.release(&id, transport.as_ref());
        }
        if count > 0 {
            info!("Closed {} MCP session(s)", count);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::{TransportError, TransportState};
    use async_trait::async_trait;
    use sluice_types::JsonRpcMessage;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubTransport {
        session: Session,
        closed: AtomicBool,
    }

    impl StubTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                session: Session::new(),
                closed: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        fn session(&self) -> &Session {
            &self.session
        }

        fn state(&self) -> TransportState {
            if self.closed.load(Ordering::SeqCst) {
                TransportState::Closed
            } else {
                TransportState::Open
            }
        }

        async fn send(&self, _message: &JsonRpcMessage) -> Result<(), TransportError> {
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 36);
    }

    #[test]
    fn test_register_lookup_remove() {
        let registry = SessionRegistry::new();
        let transport = StubTransport::new();

        registry.register("s1", transport.clone()).unwrap();
        assert!(registry.contains("s1"));
        assert_eq!(registry.session_count(), 1);
        assert!(registry.lookup("s1").is_some());
        assert!(registry.lookup("s2").is_none());

        assert!(registry.remove("s1"));
        assert!(!registry.remove("s1"));
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let registry = SessionRegistry::new();
        let first = StubTransport::new();
        let second = StubTransport::new();

        registry.register("dup", first.clone()).unwrap();
        let err = registry.register("dup", second).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSession(id) if id == "dup"));

        // The original entry is untouched.
        let entry = registry.lookup("dup").unwrap();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&entry), Arc::as_ptr(&first)));
    }

    #[test]
    fn test_release_only_removes_own_entry() {
        let registry = SessionRegistry::new();
        let owner = StubTransport::new();
        let stranger = StubTransport::new();

        registry.register("s", owner.clone()).unwrap();
        assert!(!registry.release("s", stranger.as_ref()));
        assert!(registry.contains("s"));
        assert!(registry.release("s", owner.as_ref()));
        assert!(!registry.contains("s"));
    }

    #[test]
    fn test_close_all_empties_registry() {
        let registry = SessionRegistry::new();
        let a = StubTransport::new();
        let b = StubTransport::new();
        registry.register("a", a.clone()).unwrap();
        registry.register("b", b.clone()).unwrap();

        assert_eq!(registry.close_all(), 2);
        assert_eq!(registry.session_count(), 0);
        assert_eq!(a.state(), TransportState::Closed);
        assert_eq!(b.state(), TransportState::Closed);
    }

    #[test]
    fn test_register_after_close_all_is_refused() {
        let registry = SessionRegistry::new();
        registry.close_all();

        let late = StubTransport::new();
        let err = registry.register("late", late).unwrap_err();
        assert!(matches!(err, RegistryError::ShuttingDown));
        assert_eq!(registry.session_count(), 0);
        assert!(registry.lookup("late").is_none());
    }
}
