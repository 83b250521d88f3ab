//! Execution plans and plan steps.

use crate::tool::AgentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::HashSet;

/// Lifecycle of a single plan step.
///
/// A step is created `Pending` by the planner and transitions to
/// `Completed` or `Failed` exactly once; it is never re-executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// One planned unit of work, assigned to a single agent kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Unique step ID
    pub step_id: String,

    /// Which agent executes this step
    pub agent_kind: AgentKind,

    /// What this step should accomplish
    pub description: String,

    /// Suggested tool, if the planner named one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Parameters passed through to the agent
    #[serde(default)]
    pub parameters: HashMap<String, Value>,

    /// Indices of earlier steps this step depends on
    #[serde(default)]
    pub depends_on: Vec<usize>,

    /// Current status
    pub status: StepStatus,

    /// Result payload, set once on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error message, set once on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStep {
    pub fn new(agent_kind: AgentKind, description: impl Into<String>) -> Self {
        Self {
            step_id: format!("step_{}", uuid::Uuid::new_v4()),
            agent_kind,
            description: description.into(),
            tool_name: None,
            parameters: HashMap::new(),
            depends_on: Vec::new(),
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_depends_on(mut self, depends_on: Vec<usize>) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Whether this step is still awaiting execution.
    pub fn is_open(&self) -> bool {
        matches!(self.status, StepStatus::Pending | StepStatus::InProgress)
    }

    /// Record a successful execution. No-op if the step already reached a
    /// terminal status (completed/failed transitions happen exactly once).
    pub fn mark_completed(&mut self, result: Value) {
        if self.is_open() {
            self.status = StepStatus::Completed;
            self.result = Some(result);
        }
    }

    /// Record a failed execution. Same set-once discipline as
    /// [`mark_completed`](Self::mark_completed).
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        if self.is_open() {
            self.status = StepStatus::Failed;
            self.error = Some(error.into());
        }
    }
}

/// An ordered multi-step plan for one turn.
///
/// Created once per turn and reused; never regenerated mid-execution.
/// Step statuses mutate as execution proceeds, but the step list, order,
/// and parameters are fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Unique plan ID
    pub plan_id: String,

    /// The user query this plan answers
    pub query: String,

    /// Ordered steps
    pub steps: Vec<ExecutionStep>,

    /// Whether a consolidation pass is expected after the last step
    pub requires_consolidation: bool,

    /// Planner's complexity estimate, bounded to [1, 10]
    pub estimated_complexity: u8,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    /// Build a plan from ordered steps. `requires_consolidation` is derived
    /// from the step list: true iff more than one distinct agent kind
    /// appears.
    pub fn new(query: impl Into<String>, steps: Vec<ExecutionStep>) -> Self {
        let distinct = Self::count_distinct_kinds(&steps);
        let complexity = (steps.len() as i64 * 2).clamp(1, 10) as u8;

        Self {
            plan_id: format!("plan_{}", uuid::Uuid::new_v4()),
            query: query.into(),
            requires_consolidation: distinct > 1,
            estimated_complexity: complexity,
            steps,
            created_at: Utc::now(),
        }
    }

    /// Override the complexity estimate, clamped to [1, 10].
    pub fn with_complexity(mut self, estimate: i64) -> Self {
        self.estimated_complexity = estimate.clamp(1, 10) as u8;
        self
    }

    /// Number of distinct agent kinds across all steps.
    pub fn distinct_agent_kinds(&self) -> usize {
        Self::count_distinct_kinds(&self.steps)
    }

    /// Whether the cursor has run past the last step.
    pub fn is_exhausted(&self, cursor: usize) -> bool {
        cursor >= self.steps.len()
    }

    fn count_distinct_kinds(steps: &[ExecutionStep]) -> usize {
        steps
            .iter()
            .map(|s| s.agent_kind)
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_starts_pending_with_unique_id() {
        let a = ExecutionStep::new(AgentKind::Sql, "Fetch alerts");
        let b = ExecutionStep::new(AgentKind::Sql, "Fetch alerts");

        assert!(a.step_id.starts_with("step_"));
        assert_ne!(a.step_id, b.step_id);
        assert_eq!(a.status, StepStatus::Pending);
        assert!(a.result.is_none());
        assert!(a.error.is_none());
    }

    #[test]
    fn step_completes_exactly_once() {
        let mut step = ExecutionStep::new(AgentKind::Api, "Fetch status");
        step.mark_completed(json!({"status": "ok"}));
        assert_eq!(step.status, StepStatus::Completed);

        // A second terminal transition must not overwrite the first.
        step.mark_failed("late failure");
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.error.is_none());
    }

    #[test]
    fn step_fails_exactly_once() {
        let mut step = ExecutionStep::new(AgentKind::Soap, "Fetch asset");
        step.mark_failed("connection refused");
        assert_eq!(step.status, StepStatus::Failed);

        step.mark_completed(json!({"late": true}));
        assert_eq!(step.status, StepStatus::Failed);
        assert!(step.result.is_none());
    }

    #[test]
    fn single_kind_plan_needs_no_consolidation() {
        let plan = ExecutionPlan::new(
            "Get all active alerts",
            vec![
                ExecutionStep::new(AgentKind::Sql, "Query alerts"),
                ExecutionStep::new(AgentKind::Sql, "Query alert history"),
            ],
        );

        assert!(!plan.requires_consolidation);
        assert_eq!(plan.distinct_agent_kinds(), 1);
    }

    #[test]
    fn multi_kind_plan_requires_consolidation() {
        let plan = ExecutionPlan::new(
            "Combine database alerts with service status",
            vec![
                ExecutionStep::new(AgentKind::Sql, "Query alerts"),
                ExecutionStep::new(AgentKind::Api, "Fetch service status"),
            ],
        );

        assert!(plan.requires_consolidation);
        assert_eq!(plan.distinct_agent_kinds(), 2);
    }

    #[test]
    fn complexity_is_clamped() {
        let steps = vec![ExecutionStep::new(AgentKind::Sql, "Query")];
        assert_eq!(
            ExecutionPlan::new("q", steps.clone()).with_complexity(42).estimated_complexity,
            10
        );
        assert_eq!(
            ExecutionPlan::new("q", steps.clone()).with_complexity(0).estimated_complexity,
            1
        );
        assert_eq!(
            ExecutionPlan::new("q", steps).with_complexity(-3).estimated_complexity,
            1
        );
    }

    #[test]
    fn exhaustion_tracks_cursor() {
        let plan = ExecutionPlan::new("q", vec![ExecutionStep::new(AgentKind::Sql, "Query")]);
        assert!(!plan.is_exhausted(0));
        assert!(plan.is_exhausted(1));
        assert!(plan.is_exhausted(2));
    }

    #[test]
    fn plan_serialization_roundtrip() {
        let plan = ExecutionPlan::new(
            "q",
            vec![ExecutionStep::new(AgentKind::Api, "Fetch").with_tool("get_service_status")],
        );
        let json = serde_json::to_string(&plan).unwrap();
        let back: ExecutionPlan = serde_json::from_str(&json).unwrap();

        assert_eq!(back.plan_id, plan.plan_id);
        assert_eq!(back.steps.len(), 1);
        assert_eq!(back.steps[0].tool_name.as_deref(), Some("get_service_status"));
    }
}
