//! Application state management.

use crate::forwarder::Forwarder;
use crate::mcp::{McpSessionManager, SessionSettings, ToolRegistry};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Live push-stream sessions
    sessions: McpSessionManager,
    /// Tool catalog, fixed at startup
    registry: ToolRegistry,
    /// Executes tool calls against the commerce backend
    forwarder: Arc<dyn Forwarder>,
    /// Keepalive and idle settings for new sessions
    session_settings: SessionSettings,
    /// Re-check the caller's roles on tools/call
    enforce_call_roles: bool,
    /// Externally visible base URL used in endpoint announcements
    public_url: Option<String>,
}

impl AppState {
    /// Create new application state.
    pub fn new(registry: ToolRegistry, forwarder: Arc<dyn Forwarder>) -> Self {
        Self::with_options(
            registry,
            forwarder,
            SessionSettings::default(),
            true,
            None,
        )
    }

    /// Create new application state with explicit options.
    pub fn with_options(
        registry: ToolRegistry,
        forwarder: Arc<dyn Forwarder>,
        session_settings: SessionSettings,
        enforce_call_roles: bool,
        public_url: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                sessions: McpSessionManager::new(),
                registry,
                forwarder,
                session_settings,
                enforce_call_roles,
                public_url: public_url
                    .map(|url| url.trim_end_matches('/').to_string())
                    .filter(|url| !url.is_empty()),
            }),
        }
    }

    /// Get the session store.
    pub fn sessions(&self) -> &McpSessionManager {
        &self.inner.sessions
    }

    /// Get the tool registry.
    pub fn registry(&self) -> &ToolRegistry {
        &self.inner.registry
    }

    /// Get the backend forwarder.
    pub fn forwarder(&self) -> &dyn Forwarder {
        self.inner.forwarder.as_ref()
    }

    pub fn session_settings(&self) -> &SessionSettings {
        &self.inner.session_settings
    }

    pub fn enforce_call_roles(&self) -> bool {
        self.inner.enforce_call_roles
    }

    pub fn public_url(&self) -> Option<&str> {
        self.inner.public_url.as_deref()
    }
}
