//! Common types shared across Tributary crates.
//!
//! This crate provides the foundational data model that the planner, the
//! agents, and the workflow engine use to communicate: the error taxonomy,
//! tool metadata, execution plans, agent results, and the per-turn state
//! record with its merge rules.

pub mod error;
pub mod plan;
pub mod result;
pub mod state;
pub mod tool;

pub use error::{Result, TributaryError};
pub use plan::{ExecutionPlan, ExecutionStep, StepStatus};
pub use result::{count_rows, AgentResult, ResultMetadata};
pub use state::{
    AgentState, MessageRole, NextNode, PerformanceMetrics, StateUpdate, TurnMessage,
};
pub use tool::{AgentKind, ToolMetadata};
