//! SQL agent - relational database retrieval.

use crate::adapter::DataAdapter;
use crate::executor::ToolCallRunner;
use crate::registry::ToolCapabilityRegistry;
use crate::traits::Agent;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tributary_common::{AgentKind, AgentResult};
use tributary_llm::LlmClient;

const SQL_SYSTEM_PROMPT: &str = r#"You are a database retrieval assistant. Your role is to:

1. Understand natural-language data questions
2. Select the single most appropriate database tool for the question
3. Provide tool arguments that narrow the result set (tables, filters, limits)
4. Prefer precise filters over broad scans

Only read data, never modify it.
If no available tool can answer the question, say so briefly instead of guessing.
"#;

/// Agent for the relational database data source.
pub struct SqlAgent {
    runner: ToolCallRunner,
}

impl SqlAgent {
    /// Build the agent with its capability-filtered tool snapshot.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        adapter: Arc<dyn DataAdapter>,
        tools: &ToolCapabilityRegistry,
    ) -> Self {
        let filtered = tools.filter_by_source(AgentKind::Sql.as_str());
        Self {
            runner: ToolCallRunner::new(llm, adapter, filtered),
        }
    }

    /// Rows come back from the adapter in final shape already.
    fn parse_payload(value: Value) -> Value {
        value
    }
}

#[async_trait]
impl Agent for SqlAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Sql
    }

    fn system_prompt(&self) -> &str {
        SQL_SYSTEM_PROMPT
    }

    async fn execute(
        &self,
        query: &str,
        context: Option<&str>,
        parameters: &HashMap<String, Value>,
    ) -> AgentResult {
        self.runner
            .run(
                self.kind(),
                self.system_prompt(),
                query,
                context,
                parameters,
                Self::parse_payload,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_passes_through_unchanged() {
        let rows = json!([{"id": 1, "severity": "high"}]);
        assert_eq!(SqlAgent::parse_payload(rows.clone()), rows);
    }
}
