//! REST agent - HTTP/JSON service retrieval.

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

const REST_SYSTEM_PROMPT: &str = r#"You are a REST service retrieval assistant. Your role is to:

1. Understand natural-language questions about live service data
2. Select the single most appropriate endpoint tool for the question
3. Provide tool arguments matching the endpoint's expected fields
4. Prefer specific resource lookups over broad listings

Only fetch data, never trigger side effects.
If no available tool can answer the question, say so briefly instead of guessing.
"#;

/// Agent for the REST (API) data source.
pub struct RestAgent {
    runner: ToolCallRunner,
}

impl RestAgent {
    /// Build the agent with its capability-filtered tool snapshot.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        adapter: Arc<dyn DataAdapter>,
        tools: &ToolCapabilityRegistry,
    ) -> Self {
        let filtered = tools.filter_by_source(AgentKind::Api.as_str());
        Self {
            runner: ToolCallRunner::new(llm, adapter, filtered),
        }
    }

    /// Unwrap the single-key `{"data": ...}` / `{"items": ...}` wrapper
    /// many REST endpoints put around their payload.
    fn parse_payload(value: Value) -> Value {
        if let Value::Object(ref map) = value {
            if map.len() == 1 {
                if let Some(inner) = map.get("data").or_else(|| map.get("items")) {
                    return inner.clone();
                }
            }
        }
        value
    }
}

#[async_trait]
impl Agent for RestAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Api
    }

    fn system_prompt(&self) -> &str {
        REST_SYSTEM_PROMPT
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
