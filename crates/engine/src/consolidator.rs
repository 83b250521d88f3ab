//! Consolidation node: merge multi-source results into one answer.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tributary_common::{AgentKind, AgentState, StateUpdate};
use tributary_llm::{ChatMessage, LlmClient, LlmRequest};

const CONSOLIDATOR_SYSTEM_PROMPT: &str = r#"You are a consolidation assistant for a federated data-retrieval system. You receive the results that several data sources returned for one user question. Your role is to:

1. Merge the per-source results into one coherent answer to the question
2. Attribute facts to the source they came from (database, REST service, SOAP service)
3. Reconcile overlaps and point out contradictions between sources
4. State clearly when a source reported an error or returned nothing

Answer concisely in plain prose. Do not invent data that is not present in the results.
"#;

/// Marker prefixed to the final response when summarization failed and
/// raw results are returned instead.
const DEGRADED_MARKER: &str = "[consolidation degraded: raw results follow]";

/// Merges the accumulated per-source result lists into a final
/// response. Operates only on already-fetched results; adapters are
/// never re-invoked from here.
#[derive(Clone)]
pub struct ConsolidatorNode {
    llm: Arc<dyn LlmClient>,
}

impl ConsolidatorNode {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Render all accumulated results — error-bearing ones included —
    /// as sectioned text for the summarization prompt.
    fn render_results(state: &AgentState) -> String {
        let mut sections = Vec::new();
        for kind in AgentKind::ALL {
            for result in state.results_for(kind) {
                let header = match &result.tool_name {
                    Some(tool) => format!("--- {kind} ({tool}) ---"),
                    None => format!("--- {kind} ---"),
                };
                let body = match &result.error {
                    Some(error) => format!("ERROR: {error}"),
                    None => serde_json::to_string_pretty(&result.data)
                        .unwrap_or_else(|_| result.data.to_string()),
                };
                sections.push(format!("{header}\n{body}"));
            }
        }
        sections.join("\n\n")
    }

    /// Structured view of everything that was fetched, grouped by
    /// source. Errors appear as `{"error": ...}` entries.
    fn build_consolidated_data(state: &AgentState) -> Value {
        let mut by_source = serde_json::Map::new();
        for kind in AgentKind::ALL {
            let results = state.results_for(kind);
            if results.is_empty() {
                continue;
            }
            let entries: Vec<Value> = results
                .iter()
                .map(|r| match &r.error {
                    Some(error) => json!({ "error": error }),
                    None => r.data.clone(),
                })
                .collect();
            by_source.insert(kind.as_str().to_string(), Value::Array(entries));
        }
        Value::Object(by_source)
    }

    pub async fn run(&self, state: &AgentState) -> StateUpdate {
        let rendered = Self::render_results(state);
        let result_count = state.all_results().count();

        info!(
            session_id = %state.session_id,
            results = result_count,
            sources = state.distinct_result_kinds(),
            "Consolidating results"
        );

        let mut update = StateUpdate {
            consolidated_data: Some(Self::build_consolidated_data(state)),
            next_agent: Some(None),
            should_continue: Some(false),
            ..Default::default()
        };

        let request = LlmRequest {
            system_prompt: Some(CONSOLIDATOR_SYSTEM_PROMPT.to_string()),
            messages: vec![ChatMessage::user(format!(
                "Question:\n{}\n\nRetrieved results:\n{}\n\nProvide one consolidated answer.",
                state.user_query, rendered
            ))],
            tools: vec![],
            temperature: None,
            max_tokens: None,
        };

        match self.llm.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                debug!(
                    response_len = response.content.len(),
                    "Consolidated response produced"
                );
                update.final_response = Some(response.content.trim().to_string());
            }
            Ok(_) => {
                warn!("Consolidation produced an empty response, degrading to raw results");
                update
                    .errors
                    .push("Consolidation failed: empty response".to_string());
                update.final_response = Some(format!("{DEGRADED_MARKER}\n\n{rendered}"));
            }
            Err(e) => {
                warn!(error = %e, "Consolidation failed, degrading to raw results");
                update.errors.push(format!("Consolidation failed: {e}"));
                update.final_response = Some(format!("{DEGRADED_MARKER}\n\n{rendered}"));
            }
        }

        update
    }
}
