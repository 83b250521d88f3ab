//! Pure transition functions between workflow nodes.
//!
//! The engine loop never decides where to go next; it asks these
//! functions and follows the returned [`Transition`]. Keeping routing
//! pure over the state makes every transition table-testable.

use tributary_common::{AgentKind, AgentState, NextNode};

/// Where control flows next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Dispatch the named agent
    Agent(AgentKind),
    /// Run the consolidation pass
    Consolidate,
    /// Return to the supervisor
    Supervisor,
    /// Terminate the turn
    End,
}

/// Route after a supervisor pass. A cleared `next_agent` is the sole
/// supervisor-side termination signal.
pub fn route_from_supervisor(state: &AgentState) -> Transition {
    match state.next_agent {
        None => Transition::End,
        Some(NextNode::Consolidator) => Transition::Consolidate,
        Some(NextNode::Agent(kind)) => Transition::Agent(kind),
    }
}

/// Route after an agent pass.
///
/// `should_continue == false` short-circuits to the end even with steps
/// remaining (cooperative early exit, e.g. an unrecoverable upstream
/// error). Otherwise control always returns to the supervisor, which
/// either dispatches the step under the cursor or — once the cursor has
/// run past the plan — makes the terminal consolidate-or-finish
/// decision.
pub fn route_from_agent(state: &AgentState) -> Transition {
    if !state.should_continue {
        return Transition::End;
    }
    Transition::Supervisor
}
