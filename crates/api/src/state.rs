//! Application state for the API server.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tributary_common::{AgentKind, AgentState};
use tributary_engine::WorkflowEngine;

/// Shared application state for the API server.
pub struct AppState {
    /// The engine that drives every turn
    pub engine: Arc<WorkflowEngine>,

    /// Agent kinds wired at startup (for health reporting)
    pub agent_kinds: Vec<AgentKind>,

    /// Last turn state per session, fed back as `prior_state` so a
    /// session's history accumulates across turns. In-memory only;
    /// durable chat history is the caller's concern.
    pub sessions: RwLock<HashMap<String, AgentState>>,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(engine: Arc<WorkflowEngine>, agent_kinds: Vec<AgentKind>) -> Self {
        Self {
            engine,
            agent_kinds,
            sessions: RwLock::new(HashMap::new()),
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
