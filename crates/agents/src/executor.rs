//! Shared tool-calling executor behind every agent.

use crate::adapter::DataAdapter;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use tributary_common::{AgentKind, AgentResult, ToolMetadata, TributaryError};
use tributary_llm::{ChatMessage, LlmClient, LlmRequest, ToolSchema};

/// Temperature for tool selection; low for consistent routing.
const TOOL_SELECTION_TEMPERATURE: f32 = 0.2;

/// Runs one retrieval request end to end: enrich the query, let the
/// LLM choose among this agent's filtered tools, execute the chosen
/// tool against the adapter, and normalize the outcome.
///
/// The runner is the only place where agent-side failures are turned
/// into error-shaped results; callers never see an `Err`.
pub struct ToolCallRunner {
    llm: Arc<dyn LlmClient>,
    adapter: Arc<dyn DataAdapter>,
    tools: Vec<ToolMetadata>,
}

impl ToolCallRunner {
    /// `tools` is the capability-filtered snapshot for one data source,
    /// copied out of the registry at construction time.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        adapter: Arc<dyn DataAdapter>,
        tools: Vec<ToolMetadata>,
    ) -> Self {
        Self { llm, adapter, tools }
    }

    pub fn tools(&self) -> &[ToolMetadata] {
        &self.tools
    }

    /// Append textual key=value hints to the query. The downstream tool
    /// selection consumes natural language, so hints stay textual.
    fn enrich_query(
        query: &str,
        context: Option<&str>,
        parameters: &HashMap<String, Value>,
    ) -> String {
        let mut enriched = query.to_string();

        if let Some(context) = context {
            if !context.is_empty() {
                enriched.push_str("\n\nStep context: ");
                enriched.push_str(context);
            }
        }

        if !parameters.is_empty() {
            let mut keys: Vec<_> = parameters.keys().collect();
            keys.sort();
            let hints = keys
                .iter()
                .map(|k| format!("{}={}", k, parameters[*k]))
                .collect::<Vec<_>>()
                .join(", ");
            enriched.push_str("\n\nFilter hints: ");
            enriched.push_str(&hints);
        }

        enriched
    }

    fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                name: t.tool_name.clone(),
                description: t.description.clone(),
                parameters: json!({
                    "type": "object",
                    "properties": {},
                    "additionalProperties": true
                }),
            })
            .collect()
    }

    /// Adapter payloads sometimes arrive as JSON-encoded strings.
    /// Decode when possible; otherwise wrap the raw text rather than
    /// failing the step.
    fn decode_payload(value: Value) -> Value {
        match value {
            Value::String(s) => {
                serde_json::from_str(&s).unwrap_or_else(|_| json!({ "result": s }))
            }
            other => other,
        }
    }

    /// Execute one request for `kind`. `parse_payload` is the agent's
    /// response-shape hook (envelope unwrapping etc.).
    pub async fn run(
        &self,
        kind: AgentKind,
        system_prompt: &str,
        query: &str,
        context: Option<&str>,
        parameters: &HashMap<String, Value>,
        parse_payload: fn(Value) -> Value,
    ) -> AgentResult {
        let start = Instant::now();
        let context_owned = context.map(String::from);

        if self.tools.is_empty() {
            warn!(agent = %kind, "No tools registered for this data source");
            return AgentResult::failure(
                kind,
                TributaryError::ToolNotFound(format!(
                    "no tools registered for data source '{kind}'"
                ))
                .to_string(),
                query,
                context_owned,
                start.elapsed().as_millis() as u64,
            );
        }

        let enriched = Self::enrich_query(query, context, parameters);
        debug!(
            agent = %kind,
            tool_count = self.tools.len(),
            query_len = enriched.len(),
            "Dispatching retrieval request"
        );

        let request = LlmRequest {
            system_prompt: Some(system_prompt.to_string()),
            messages: vec![ChatMessage::user(enriched)],
            tools: self.tool_schemas(),
            temperature: Some(TOOL_SELECTION_TEMPERATURE),
            max_tokens: None,
        };

        let response = match self.llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(agent = %kind, error = %e, "LLM call failed");
                return AgentResult::failure(
                    kind,
                    TributaryError::AgentExecution(format!("LLM call failed: {e}")).to_string(),
                    query,
                    context_owned,
                    start.elapsed().as_millis() as u64,
                );
            }
        };

        let Some(call) = response.tool_calls.first() else {
            // No tool call is low confidence, not failure: surface the
            // model's text as a degraded success.
            debug!(agent = %kind, "Model answered without a tool call");
            return AgentResult::degraded(
                kind,
                response.content,
                query,
                context_owned,
                start.elapsed().as_millis() as u64,
            );
        };

        if !self.tools.iter().any(|t| t.tool_name == call.name) {
            warn!(agent = %kind, tool = %call.name, "Model requested an unknown tool");
            return AgentResult::failure(
                kind,
                TributaryError::ToolNotFound(format!(
                    "'{}' is not in the {kind} tool set",
                    call.name
                ))
                .to_string(),
                query,
                context_owned,
                start.elapsed().as_millis() as u64,
            );
        }

        info!(agent = %kind, tool = %call.name, "Executing tool");

        match self.adapter.execute(&call.name, &call.arguments).await {
            Ok(raw) => {
                let data = parse_payload(Self::decode_payload(raw));
                AgentResult::success(
                    kind,
                    Some(call.name.clone()),
                    data,
                    query,
                    context_owned,
                    start.elapsed().as_millis() as u64,
                )
            }
            Err(e) => {
                warn!(agent = %kind, tool = %call.name, error = %e, "Adapter call failed");
                AgentResult::failure(
                    kind,
                    format!("Tool '{}' failed: {e}", call.name),
                    query,
                    context_owned,
                    start.elapsed().as_millis() as u64,
                )
            }
        }
    }
}
