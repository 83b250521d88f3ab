//! The core agent trait.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tributary_common::{AgentKind, AgentResult};

/// A capability-filtered executor bound to one data source.
///
/// `execute` never returns an error: every failure mode (missing tools,
/// LLM errors, adapter errors) is converted into an error-shaped
/// [`AgentResult`] so the workflow engine can keep driving the plan.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Which data source this agent serves.
    fn kind(&self) -> AgentKind;

    /// The agent's system prompt.
    fn system_prompt(&self) -> &str;

    /// Run one retrieval request. `context` carries the plan step's
    /// description; `parameters` are the step's structured hints.
    async fn execute(
        &self,
        query: &str,
        context: Option<&str>,
        parameters: &HashMap<String, Value>,
    ) -> AgentResult;
}
