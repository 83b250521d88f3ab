//! Per-turn workflow state and the partial-update merge rules.
//!
//! The `WorkflowEngine` is the sole owner of an [`AgentState`]. Nodes
//! (supervisor, agents, consolidator) receive a read view and return a
//! [`StateUpdate`]; the engine folds each update into the state with
//! fixed per-field semantics:
//!
//! - accumulating fields (`results`, `messages`, `errors`) are appended,
//!   never truncated or replaced;
//! - map fields (`intermediate_data`, `context`) are merged key-by-key;
//! - scalar fields (plan, cursor, `next_agent`, `should_continue`,
//!   `final_response`, `consolidated_data`) take the latest value when
//!   the update carries one.

use crate::plan::ExecutionPlan;
use crate::result::AgentResult;
use crate::tool::AgentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Role of a message in the turn history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One entry of the accumulating message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Where the supervisor wants control to go next.
///
/// `None` in [`AgentState::next_agent`] is the supervisor-side
/// termination signal; `Consolidator` routes to the merge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextNode {
    Agent(AgentKind),
    Consolidator,
}

/// Engine-recorded timing and counting metrics for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Accumulated wall-clock per node label ("supervisor",
    /// "agent:sql", "consolidator", ...)
    pub node_timings_ms: HashMap<String, u64>,

    /// Plan steps dispatched to agents
    pub steps_executed: u32,

    /// Total turn duration, set once at turn end
    pub turn_duration_ms: u64,
}

impl PerformanceMetrics {
    pub fn record(&mut self, node: &str, elapsed_ms: u64) {
        *self.node_timings_ms.entry(node.to_string()).or_insert(0) += elapsed_ms;
    }
}

/// Mutable record threaded through one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub user_query: String,
    pub session_id: String,

    /// The plan for this turn; created once, reused on re-entry
    pub execution_plan: Option<ExecutionPlan>,

    /// Index of the next step to dispatch. Advanced only by the
    /// post-agent merge (single-writer rule).
    pub current_step_index: usize,

    /// Accumulating per-source result lists
    pub sql_results: Vec<AgentResult>,
    pub api_results: Vec<AgentResult>,
    pub soap_results: Vec<AgentResult>,

    /// Scratch data shared between steps, keyed by step ID
    pub intermediate_data: HashMap<String, Value>,

    /// Caller-provided context, carried across turns of a session
    pub context: HashMap<String, Value>,

    pub final_response: Option<String>,
    pub consolidated_data: Option<Value>,

    /// Accumulating conversation history
    pub messages: Vec<TurnMessage>,

    /// Accumulating turn-level error descriptions
    pub errors: Vec<String>,

    pub performance_metrics: PerformanceMetrics,

    /// Supervisor's routing decision for the next hop
    pub next_agent: Option<NextNode>,

    /// Cooperative continuation flag; false short-circuits the loop
    pub should_continue: bool,
}

impl AgentState {
    pub fn new(user_query: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            session_id: session_id.into(),
            execution_plan: None,
            current_step_index: 0,
            sql_results: Vec::new(),
            api_results: Vec::new(),
            soap_results: Vec::new(),
            intermediate_data: HashMap::new(),
            context: HashMap::new(),
            final_response: None,
            consolidated_data: None,
            messages: Vec::new(),
            errors: Vec::new(),
            performance_metrics: PerformanceMetrics::default(),
            next_agent: None,
            should_continue: true,
        }
    }

    /// Start a new turn continuing an earlier session: message history
    /// and context carry over, everything turn-scoped resets.
    pub fn continue_from(
        user_query: impl Into<String>,
        session_id: impl Into<String>,
        prior: AgentState,
    ) -> Self {
        let mut state = Self::new(user_query, session_id);
        state.messages = prior.messages;
        state.context = prior.context;
        state
    }

    /// Read the accumulating result list for one agent kind.
    pub fn results_for(&self, kind: AgentKind) -> &[AgentResult] {
        match kind {
            AgentKind::Sql => &self.sql_results,
            AgentKind::Api => &self.api_results,
            AgentKind::Soap => &self.soap_results,
        }
    }

    /// All accumulated results in source order (sql, api, soap).
    pub fn all_results(&self) -> impl Iterator<Item = &AgentResult> {
        self.sql_results
            .iter()
            .chain(self.api_results.iter())
            .chain(self.soap_results.iter())
    }

    /// How many distinct agent kinds have contributed at least one
    /// result (error-shaped results count — the agent did run).
    pub fn distinct_result_kinds(&self) -> usize {
        AgentKind::ALL
            .iter()
            .filter(|kind| !self.results_for(**kind).is_empty())
            .count()
    }

    /// Fold a partial update into this state. See the module docs for
    /// the append-vs-replace contract.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(plan) = update.execution_plan {
            self.execution_plan = Some(plan);
        }
        if let Some(cursor) = update.current_step_index {
            self.current_step_index = cursor;
        }
        for result in update.results {
            match result.agent_kind {
                AgentKind::Sql => self.sql_results.push(result),
                AgentKind::Api => self.api_results.push(result),
                AgentKind::Soap => self.soap_results.push(result),
            }
        }
        self.intermediate_data.extend(update.intermediate_data);
        self.context.extend(update.context);
        if let Some(response) = update.final_response {
            self.final_response = Some(response);
        }
        if let Some(data) = update.consolidated_data {
            self.consolidated_data = Some(data);
        }
        self.messages.extend(update.messages);
        self.errors.extend(update.errors);
        if let Some(next) = update.next_agent {
            self.next_agent = next;
        }
        if let Some(flag) = update.should_continue {
            self.should_continue = flag;
        }
    }
}

/// A partial state update returned by a node.
///
/// Empty (`Default`) means "no change". `next_agent` is doubly optional:
/// `None` leaves the field alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateUpdate {
    pub execution_plan: Option<ExecutionPlan>,
    pub current_step_index: Option<usize>,

    /// Results to append, routed to the matching per-source list
    pub results: Vec<AgentResult>,

    /// Keys merged into `intermediate_data`
    pub intermediate_data: HashMap<String, Value>,

    /// Keys merged into `context`
    pub context: HashMap<String, Value>,

    pub final_response: Option<String>,
    pub consolidated_data: Option<Value>,

    /// Messages to append
    pub messages: Vec<TurnMessage>,

    /// Errors to append
    pub errors: Vec<String>,

    pub next_agent: Option<Option<NextNode>>,
    pub should_continue: Option<bool>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        self.execution_plan.is_none()
            && self.current_step_index.is_none()
            && self.results.is_empty()
            && self.intermediate_data.is_empty()
            && self.context.is_empty()
            && self.final_response.is_none()
            && self.consolidated_data.is_none()
            && self.messages.is_empty()
            && self.errors.is_empty()
            && self.next_agent.is_none()
            && self.should_continue.is_none()
    }
}
