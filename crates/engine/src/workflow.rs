//! The workflow engine: owns the turn state and drives the node cycle.

use crate::consolidator::ConsolidatorNode;
use crate::planner::ExecutionPlanner;
use crate::router::{route_from_agent, route_from_supervisor, Transition};
use crate::supervisor::SupervisorNode;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tributary_agents::{AgentRegistry, ToolCapabilityRegistry};
use tributary_common::{
    AgentKind, AgentResult, AgentState, PerformanceMetrics, StateUpdate, StepStatus, TurnMessage,
    TributaryError,
};
use tributary_llm::LlmClient;

/// One progress event of a streamed turn: which node ran, and the
/// partial update it produced.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowEvent {
    pub node: String,
    pub state_patch: StateUpdate,
}

/// What one turn returns to the caller. Always carries a
/// `final_response`, even under total failure.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub final_response: String,
    pub consolidated_data: Option<Value>,
    pub errors: Vec<String>,
    pub performance_metrics: PerformanceMetrics,
    /// Full turn state, passed back as `prior_state` by callers
    /// continuing the conversation
    pub state: AgentState,
}

/// Drives supervisor → router → agent → merge cycles until a terminal
/// transition, then consolidates if needed.
///
/// One engine instance serves many sessions; each turn owns its own
/// [`AgentState`], so concurrency exists only across independent
/// sessions. Within a turn, plan steps execute strictly sequentially.
pub struct WorkflowEngine {
    supervisor: SupervisorNode,
    consolidator: ConsolidatorNode,
    agents: Arc<AgentRegistry>,
    /// Upper bound on dispatched steps per turn (runaway guard)
    max_steps_per_turn: usize,
}

impl WorkflowEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: &ToolCapabilityRegistry,
        agents: Arc<AgentRegistry>,
        max_steps_per_turn: usize,
    ) -> Self {
        Self {
            supervisor: SupervisorNode::new(ExecutionPlanner::new(llm.clone(), tools)),
            consolidator: ConsolidatorNode::new(llm),
            agents,
            max_steps_per_turn,
        }
    }

    /// Run one turn to completion.
    pub async fn run_turn(
        &self,
        user_query: &str,
        session_id: &str,
        prior_state: Option<AgentState>,
    ) -> TurnOutcome {
        self.drive(
            user_query,
            session_id,
            prior_state,
            None,
            CancellationToken::new(),
        )
        .await
    }

    /// Run one turn that can be abandoned between steps via `cancel`.
    pub async fn run_turn_with_cancel(
        &self,
        user_query: &str,
        session_id: &str,
        prior_state: Option<AgentState>,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        self.drive(user_query, session_id, prior_state, None, cancel)
            .await
    }

    /// Run one turn in the background, streaming `{node, state_patch}`
    /// events for progress display. The channel closes when the turn
    /// completes.
    pub fn stream_turn(
        self: &Arc<Self>,
        user_query: impl Into<String>,
        session_id: impl Into<String>,
        prior_state: Option<AgentState>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<WorkflowEvent> {
        let (tx, rx) = mpsc::channel(32);
        let engine = Arc::clone(self);
        let user_query = user_query.into();
        let session_id = session_id.into();

        tokio::spawn(async move {
            engine
                .drive(&user_query, &session_id, prior_state, Some(tx), cancel)
                .await;
        });

        rx
    }

    async fn drive(
        &self,
        user_query: &str,
        session_id: &str,
        prior_state: Option<AgentState>,
        events: Option<mpsc::Sender<WorkflowEvent>>,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let turn_start = Instant::now();

        let mut state = match prior_state {
            Some(prior) => AgentState::continue_from(user_query, session_id, prior),
            None => AgentState::new(user_query, session_id),
        };
        state.messages.push(TurnMessage::user(user_query));

        info!(
            session_id = %state.session_id,
            query_preview = %user_query.chars().take(50).collect::<String>(),
            "Starting turn"
        );

        let mut dispatched = 0usize;

        loop {
            if cancel.is_cancelled() {
                self.handle_cancellation(&mut state, events.as_ref()).await;
                break;
            }

            // Supervisor pass
            let node_start = Instant::now();
            let update = self.supervisor.run(&state).await;
            state
                .performance_metrics
                .record("supervisor", node_start.elapsed().as_millis() as u64);
            Self::emit(events.as_ref(), "supervisor", &update).await;
            state.apply(update);

            match route_from_supervisor(&state) {
                Transition::End => break,

                Transition::Consolidate => {
                    if cancel.is_cancelled() {
                        self.handle_cancellation(&mut state, events.as_ref()).await;
                        break;
                    }
                    let node_start = Instant::now();
                    let update = self.consolidator.run(&state).await;
                    state
                        .performance_metrics
                        .record("consolidator", node_start.elapsed().as_millis() as u64);
                    Self::emit(events.as_ref(), "consolidator", &update).await;
                    state.apply(update);
                    break;
                }

                Transition::Agent(kind) => {
                    if dispatched >= self.max_steps_per_turn {
                        warn!(
                            session_id = %state.session_id,
                            max_steps = self.max_steps_per_turn,
                            "Step budget exceeded, stopping dispatch"
                        );
                        let update = StateUpdate {
                            errors: vec![format!(
                                "Step budget of {} exceeded",
                                self.max_steps_per_turn
                            )],
                            next_agent: Some(None),
                            should_continue: Some(false),
                            ..Default::default()
                        };
                        Self::emit(events.as_ref(), "engine", &update).await;
                        state.apply(update);
                        break;
                    }

                    self.dispatch_step(&mut state, kind, events.as_ref()).await;
                    dispatched += 1;

                    if route_from_agent(&state) == Transition::End {
                        break;
                    }
                    // Otherwise: back to the supervisor.
                }

                // route_from_supervisor never yields this; keep looping.
                Transition::Supervisor => continue,
            }
        }

        self.finalize(&mut state, events.as_ref(), turn_start).await
    }

    /// Execute the step under the cursor with the named agent and fold
    /// the outcome. The cursor advances here and nowhere else.
    async fn dispatch_step(
        &self,
        state: &mut AgentState,
        kind: AgentKind,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) {
        let cursor = state.current_step_index;

        let step_info = state.execution_plan.as_ref().and_then(|plan| {
            plan.steps
                .get(cursor)
                .map(|s| (s.description.clone(), s.parameters.clone(), s.step_id.clone()))
        });

        let Some((description, parameters, step_id)) = step_info else {
            // The supervisor named an agent without a step under the
            // cursor; stop rather than dispatch blind.
            let update = StateUpdate {
                errors: vec![format!("No dispatchable step at index {cursor}")],
                next_agent: Some(None),
                should_continue: Some(false),
                ..Default::default()
            };
            Self::emit(events, "engine", &update).await;
            state.apply(update);
            return;
        };

        if let Some(step) = step_at(state, cursor) {
            step.status = StepStatus::InProgress;
        }

        let node = format!("agent:{kind}");
        let step_start = Instant::now();

        let result = match self.agents.get(kind) {
            Some(agent) => {
                agent
                    .execute(&state.user_query, Some(&description), &parameters)
                    .await
            }
            None => {
                warn!(agent = %kind, "No agent registered for this kind");
                AgentResult::failure(
                    kind,
                    format!("No agent registered for data source '{kind}'"),
                    &state.user_query,
                    Some(description.clone()),
                    0,
                )
            }
        };

        state
            .performance_metrics
            .record(&node, step_start.elapsed().as_millis() as u64);
        state.performance_metrics.steps_executed += 1;

        // Terminal step status, set exactly once.
        if let Some(step) = step_at(state, cursor) {
            match &result.error {
                Some(error) => step.mark_failed(error.clone()),
                None => step.mark_completed(result.data.clone()),
            }
        }

        let mut update = StateUpdate {
            current_step_index: Some(cursor + 1),
            ..Default::default()
        };
        match &result.error {
            Some(error) => {
                update
                    .errors
                    .push(format!("Step {cursor} ({kind}) failed: {error}"));
            }
            None => {
                update
                    .intermediate_data
                    .insert(step_id, result.data.clone());
            }
        }
        update.results.push(result);

        Self::emit(events, &node, &update).await;
        state.apply(update);
    }

    async fn handle_cancellation(
        &self,
        state: &mut AgentState,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) {
        warn!(session_id = %state.session_id, "Turn cancelled");
        let update = StateUpdate {
            errors: vec![TributaryError::Cancelled(
                "turn abandoned before completion".to_string(),
            )
            .to_string()],
            next_agent: Some(None),
            should_continue: Some(false),
            ..Default::default()
        };
        Self::emit(events, "cancelled", &update).await;
        state.apply(update);
    }

    async fn finalize(
        &self,
        state: &mut AgentState,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
        turn_start: Instant,
    ) -> TurnOutcome {
        if state.final_response.is_none() {
            let update = StateUpdate {
                final_response: Some(Self::fallback_response(state)),
                ..Default::default()
            };
            Self::emit(events, "finalize", &update).await;
            state.apply(update);
        }

        let final_response = state.final_response.clone().unwrap_or_default();
        state
            .messages
            .push(TurnMessage::assistant(final_response.clone()));
        state.performance_metrics.turn_duration_ms = turn_start.elapsed().as_millis() as u64;

        info!(
            session_id = %state.session_id,
            duration_ms = state.performance_metrics.turn_duration_ms,
            steps = state.performance_metrics.steps_executed,
            errors = state.errors.len(),
            "Turn complete"
        );

        TurnOutcome {
            final_response,
            consolidated_data: state.consolidated_data.clone(),
            errors: state.errors.clone(),
            performance_metrics: state.performance_metrics.clone(),
            state: state.clone(),
        }
    }

    /// Build a response when the consolidator did not run: the last
    /// successful result, or a summary of what went wrong.
    fn fallback_response(state: &AgentState) -> String {
        if let Some(result) = state.all_results().filter(|r| !r.is_error()).last() {
            if let Some(message) = result.data.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
            return serde_json::to_string_pretty(&result.data)
                .unwrap_or_else(|_| result.data.to_string());
        }
        if !state.errors.is_empty() {
            return format!(
                "The request could not be completed: {}",
                state.errors.join("; ")
            );
        }
        "No data sources were able to answer this request.".to_string()
    }

    async fn emit(
        events: Option<&mpsc::Sender<WorkflowEvent>>,
        node: &str,
        patch: &StateUpdate,
    ) {
        if let Some(tx) = events {
            let event = WorkflowEvent {
                node: node.to_string(),
                state_patch: patch.clone(),
            };
            let _ = tx.send(event).await;
        }
    }
}

fn step_at(
    state: &mut AgentState,
    cursor: usize,
) -> Option<&mut tributary_common::ExecutionStep> {
    state
        .execution_plan
        .as_mut()
        .and_then(|plan| plan.steps.get_mut(cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fallback_response_prefers_last_success() {
        let mut state = AgentState::new("q", "s1");
        state.sql_results.push(AgentResult::success(
            AgentKind::Sql,
            None,
            json!([{"id": 1}]),
            "q",
            None,
            1,
        ));
        state.api_results.push(AgentResult::failure(
            AgentKind::Api,
            "down",
            "q",
            None,
            1,
        ));

        let response = WorkflowEngine::fallback_response(&state);
        assert!(response.contains("\"id\": 1"));
    }

    #[test]
    fn fallback_response_unwraps_degraded_message() {
        let mut state = AgentState::new("q", "s1");
        state.api_results.push(AgentResult::degraded(
            AgentKind::Api,
            "No endpoint matched.",
            "q",
            None,
            1,
        ));

        assert_eq!(
            WorkflowEngine::fallback_response(&state),
            "No endpoint matched."
        );
    }

    #[test]
    fn fallback_response_reports_errors() {
        let mut state = AgentState::new("q", "s1");
        state.errors.push("Turn cancelled before completion".into());

        let response = WorkflowEngine::fallback_response(&state);
        assert!(response.contains("could not be completed"));
        assert!(response.contains("cancelled"));
    }

    #[test]
    fn fallback_response_with_nothing_at_all() {
        let state = AgentState::new("q", "s1");
        assert_eq!(
            WorkflowEngine::fallback_response(&state),
            "No data sources were able to answer this request."
        );
    }
}
