//! Orchestration engine for Tributary.
//!
//! The engine is the central brain that:
//! 1. Turns a free-text query into an ordered multi-step execution plan
//! 2. Drives the plan step by step through capability-filtered agents
//! 3. Accumulates per-source results and errors in the turn state
//! 4. Consolidates multi-source results into one final answer
//!
//! # Architecture
//!
//! ```text
//! User Query
//!      │
//!      ▼
//! ┌──────────────────┐
//! │  WorkflowEngine  │ ◄── owns the AgentState, folds node updates
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     plan exhausted      ┌──────────────────┐
//! │  SupervisorNode  │ ──────────────────────► │ ConsolidatorNode │
//! │ (plan + cursor)  │                         │  (merge results) │
//! └────────┬─────────┘                         └──────────────────┘
//!          │ next_agent
//!    ┌─────┴─────┬──────────┐
//!    ▼           ▼          ▼
//! [SQL]       [REST]     [SOAP]
//!  Agent       Agent      Agent
//! ```
//!
//! Control flow between nodes is computed by the pure functions in
//! [`router`]; the engine loop simply follows the transitions until a
//! terminal one.

pub mod config;
pub mod consolidator;
pub mod planner;
pub mod router;
pub mod supervisor;
pub mod workflow;

pub use config::EngineConfig;
pub use consolidator::ConsolidatorNode;
pub use planner::ExecutionPlanner;
pub use router::{route_from_agent, route_from_supervisor, Transition};
pub use supervisor::{SupervisorNode, SupervisorPhase};
pub use workflow::{TurnOutcome, WorkflowEngine, WorkflowEvent};
