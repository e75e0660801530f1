//! Application State

use std::sync::Arc;

use agent_core::{AgentFactory, MemorySessionStore, SessionConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Builds one agent per submitted message
    pub factory: Arc<dyn AgentFactory>,

    /// Live chat sessions
    pub sessions: Arc<MemorySessionStore>,

    /// Applied to every new session
    pub session_config: SessionConfig,

    /// Model reported by `/health`
    pub model: String,

    /// Tool names in priority order
    pub tool_names: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(
        factory: Arc<dyn AgentFactory>,
        session_config: SessionConfig,
        model: impl Into<String>,
        tool_names: Vec<String>,
    ) -> Self {
        Self {
            factory,
            sessions: Arc::new(MemorySessionStore::new()),
            session_config,
            model: model.into(),
            tool_names: Arc::new(tool_names),
        }
    }
}
