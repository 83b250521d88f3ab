//! Supervisor node: plan lifecycle and dispatch decisions.

use crate::planner::ExecutionPlanner;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tributary_common::{AgentState, NextNode, StateUpdate};

/// Progress of the supervisor through one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorPhase {
    AwaitingPlan,
    Dispatching,
    AwaitingConsolidation,
    Done,
}

/// Holds the planner and advances the turn's plan cursor decisions.
///
/// The supervisor never advances the cursor itself — that is done by
/// the post-agent merge (single-writer rule). Each entry:
///
/// 1. Ensures a plan exists (creates one exactly once, reuses it after)
/// 2. On plan exhaustion, decides consolidate-or-finish
/// 3. Otherwise selects the step under the cursor and names the agent
#[derive(Clone)]
pub struct SupervisorNode {
    planner: ExecutionPlanner,
}

impl SupervisorNode {
    pub fn new(planner: ExecutionPlanner) -> Self {
        Self { planner }
    }

    /// Current phase, derived from the state.
    pub fn phase(state: &AgentState) -> SupervisorPhase {
        match &state.execution_plan {
            None => SupervisorPhase::AwaitingPlan,
            Some(plan) if !plan.is_exhausted(state.current_step_index) => {
                SupervisorPhase::Dispatching
            }
            Some(plan) => {
                if state.final_response.is_some() {
                    SupervisorPhase::Done
                } else if state.distinct_result_kinds() > 1 || plan.requires_consolidation {
                    SupervisorPhase::AwaitingConsolidation
                } else {
                    SupervisorPhase::Done
                }
            }
        }
    }

    pub async fn run(&self, state: &AgentState) -> StateUpdate {
        let mut update = StateUpdate::default();

        // Reuse the existing plan; create one only on first entry.
        let plan = match &state.execution_plan {
            Some(plan) => plan.clone(),
            None => {
                let context = if state.context.is_empty() {
                    None
                } else {
                    serde_json::to_string(&state.context).ok()
                };
                let plan = self
                    .planner
                    .create_plan(&state.user_query, context.as_deref())
                    .await;
                update.execution_plan = Some(plan.clone());
                plan
            }
        };

        if plan.is_exhausted(state.current_step_index) {
            // Inclusive OR: the planner's flag, or more than one agent
            // kind actually contributed results.
            let consolidate = state.distinct_result_kinds() > 1 || plan.requires_consolidation;

            info!(
                session_id = %state.session_id,
                plan_id = %plan.plan_id,
                consolidate,
                "Plan exhausted"
            );

            update.next_agent = Some(if consolidate {
                Some(NextNode::Consolidator)
            } else {
                None
            });
            update.should_continue = Some(false);
        } else {
            let step = &plan.steps[state.current_step_index];
            debug!(
                session_id = %state.session_id,
                step = state.current_step_index,
                agent = %step.agent_kind,
                description = %step.description,
                "Dispatching step"
            );

            update.next_agent = Some(Some(NextNode::Agent(step.agent_kind)));
            update.should_continue = Some(true);
        }

        update
    }
}
