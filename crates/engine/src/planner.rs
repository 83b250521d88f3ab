//! LLM-backed execution planning with keyword fallback.
//!
//! The planner asks the completion service for a strict-JSON plan over
//! the registered tool catalog. Unusable output (malformed JSON,
//! unknown agent kinds, empty step lists) is never fatal: it degrades
//! to a single-step plan routed to the data source with the highest
//! keyword overlap, so a turn always has a non-empty plan to execute.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tributary_agents::ToolCapabilityRegistry;
use tributary_common::{
    AgentKind, ExecutionPlan, ExecutionStep, Result, ToolMetadata, TributaryError,
};
use tributary_llm::{ChatMessage, LlmClient, LlmRequest};

/// Low temperature for consistent planning.
const PLANNER_TEMPERATURE: f32 = 0.3;

const PLANNER_SYSTEM_PROMPT: &str = r#"You are an execution planner for a federated data-retrieval system.

Your job is to turn a user question into an ordered list of retrieval steps across the available data sources.

IMPORTANT: Respond ONLY with a JSON object, no other text. The JSON must have this exact structure:

{
  "steps": [
    {
      "agent": "sql|api|soap",
      "description": "what this step should retrieve",
      "tool_name": "preferred tool, or omit",
      "parameters": {}
    }
  ],
  "estimated_complexity": 3
}

Rules:
- Use the fewest steps that cover every part of the question
- Each step names exactly one data source agent: "sql", "api", or "soap"
- Order steps so later steps can build on earlier results
- "parameters" holds concrete filter values extracted from the question
- "estimated_complexity" is an integer from 1 (trivial lookup) to 10 (many dependent steps)"#;

/// Raw plan shape as produced by the model.
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    estimated_complexity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    agent: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    parameters: HashMap<String, Value>,
    #[serde(default)]
    depends_on: Vec<usize>,
}

/// Creates one immutable [`ExecutionPlan`] per turn.
#[derive(Clone)]
pub struct ExecutionPlanner {
    llm: Arc<dyn LlmClient>,
    /// Snapshot of the tool catalog, taken at construction
    tools: Vec<ToolMetadata>,
}

impl ExecutionPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, tools: &ToolCapabilityRegistry) -> Self {
        Self {
            llm,
            tools: tools.list(),
        }
    }

    /// Produce a plan for `query`. Never fails: planner errors degrade
    /// to the keyword-routed fallback plan.
    pub async fn create_plan(&self, query: &str, context: Option<&str>) -> ExecutionPlan {
        match self.plan_from_llm(query, context).await {
            Ok(plan) => {
                info!(
                    plan_id = %plan.plan_id,
                    steps = plan.steps.len(),
                    requires_consolidation = plan.requires_consolidation,
                    complexity = plan.estimated_complexity,
                    "Plan created"
                );
                plan
            }
            Err(e) => {
                warn!(error = %e, "Planner output unusable, falling back to keyword routing");
                self.fallback_plan(query)
            }
        }
    }

    async fn plan_from_llm(&self, query: &str, context: Option<&str>) -> Result<ExecutionPlan> {
        let mut user_prompt = format!(
            "Available tools:\n{}\n\nPlan retrieval steps for this question:\n\n{}",
            self.render_catalog(),
            query
        );
        if let Some(context) = context {
            if !context.is_empty() {
                user_prompt.push_str("\n\nSession context: ");
                user_prompt.push_str(context);
            }
        }

        let request = LlmRequest {
            system_prompt: Some(PLANNER_SYSTEM_PROMPT.to_string()),
            messages: vec![ChatMessage::user(user_prompt)],
            tools: vec![],
            temperature: Some(PLANNER_TEMPERATURE),
            max_tokens: None,
        };

        let response = self.llm.complete(request).await?;
        debug!(response_len = response.content.len(), "Planner response received");

        self.parse_plan(query, &response.content)
    }

    /// Validate and convert the model's JSON into an immutable plan.
    fn parse_plan(&self, query: &str, response: &str) -> Result<ExecutionPlan> {
        let json_str = extract_json_object(response).ok_or_else(|| {
            TributaryError::Planning(format!(
                "No JSON object in planner response: {}",
                response.chars().take(200).collect::<String>()
            ))
        })?;

        let raw: RawPlan = serde_json::from_str(json_str)
            .map_err(|e| TributaryError::Planning(format!("Invalid plan JSON: {e}")))?;

        if raw.steps.is_empty() {
            return Err(TributaryError::Planning("Planner produced no steps".into()));
        }

        let mut steps = Vec::with_capacity(raw.steps.len());
        for (index, raw_step) in raw.steps.into_iter().enumerate() {
            let kind = AgentKind::from_source(raw_step.agent.trim().to_lowercase().as_str())
                .ok_or_else(|| {
                    TributaryError::Planning(format!(
                        "Unknown agent kind '{}' in step {index}",
                        raw_step.agent
                    ))
                })?;

            // A dependency may only point at an earlier step; execution
            // is sequential, so forward references are plan bugs.
            if raw_step.depends_on.iter().any(|dep| *dep >= index) {
                return Err(TributaryError::Planning(format!(
                    "Step {index} depends on a step that does not precede it"
                )));
            }

            let description = if raw_step.description.is_empty() {
                format!("Retrieve data from the {kind} source")
            } else {
                raw_step.description
            };

            let mut step = ExecutionStep::new(kind, description)
                .with_parameters(raw_step.parameters)
                .with_depends_on(raw_step.depends_on);
            if let Some(tool_name) = raw_step.tool_name {
                step = step.with_tool(tool_name);
            }
            steps.push(step);
        }

        let mut plan = ExecutionPlan::new(query, steps);
        if let Some(complexity) = raw.estimated_complexity {
            plan = plan.with_complexity(complexity);
        }
        Ok(plan)
    }

    fn render_catalog(&self) -> String {
        self.tools
            .iter()
            .map(|t| {
                format!(
                    "- {} ({}): {} [keywords: {}]",
                    t.tool_name,
                    t.data_source,
                    t.description,
                    t.keywords.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Single-step fallback: route the whole query to the data source
    /// with the highest keyword overlap. The plan is never empty.
    fn fallback_plan(&self, query: &str) -> ExecutionPlan {
        let kind = self.best_matching_source(query);
        info!(agent = %kind, "Using single-step fallback plan");

        let step = ExecutionStep::new(
            kind,
            format!("Answer the query using the {kind} data source"),
        );
        ExecutionPlan::new(query, vec![step]).with_complexity(1)
    }

    fn best_matching_source(&self, query: &str) -> AgentKind {
        let query_lower = query.to_lowercase();

        let mut scores: HashMap<AgentKind, usize> = HashMap::new();
        for tool in &self.tools {
            let Some(kind) = AgentKind::from_source(&tool.data_source) else {
                continue;
            };
            *scores.entry(kind).or_insert(0) += overlap_score(tool, &query_lower);
        }

        // Deterministic: iterate in canonical order, strict improvement
        // replaces, so ties go to the earliest kind.
        let mut best = AgentKind::Sql;
        let mut best_score = 0;
        for kind in AgentKind::ALL {
            let score = scores.get(&kind).copied().unwrap_or(0);
            if score > best_score {
                best = kind;
                best_score = score;
            }
        }

        if best_score == 0 {
            // Nothing matched; route to the first source that has any
            // tool at all, defaulting to SQL.
            for kind in AgentKind::ALL {
                if self.tools.iter().any(|t| t.data_source == kind.as_str()) {
                    return kind;
                }
            }
        }
        best
    }
}

/// Case-insensitive substring containment over description, name, and
/// keywords.
fn overlap_score(tool: &ToolMetadata, query_lower: &str) -> usize {
    let mut score = 0;
    for keyword in &tool.keywords {
        if query_lower.contains(&keyword.to_lowercase()) {
            score += 1;
        }
    }
    for token in tool
        .tool_name
        .split('_')
        .chain(tool.description.split_whitespace())
    {
        let token = token.to_lowercase();
        if token.len() > 3 && query_lower.contains(&token) {
            score += 1;
        }
    }
    score
}

/// Extract a JSON object from a string that may contain other text.
fn extract_json_object(s: &str) -> Option<&str> {
    // Find the first '{' and matching '}'
    let start = s.find('{')?;
    let mut depth = 0;
    let mut end = start;

    for (i, c) in s[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > start {
        Some(&s[start..end])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tributary_llm::LlmResponse;

    struct ScriptedLlm(String);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
            Ok(LlmResponse::text(self.0.clone(), "test"))
        }
        fn model_name(&self) -> &str {
            "test"
        }
    }

    fn registry() -> ToolCapabilityRegistry {
        ToolCapabilityRegistry::from_tools(vec![
            ToolMetadata::new("query_database", "sql", "Run read-only database queries")
                .with_keywords(vec!["alert".into(), "database".into(), "record".into()]),
            ToolMetadata::new("get_service_status", "api", "Fetch live service status")
                .with_keywords(vec!["status".into(), "service".into(), "uptime".into()]),
            ToolMetadata::new("fetch_asset_details", "soap", "Fetch asset master data")
                .with_keywords(vec!["asset".into(), "equipment".into()]),
        ])
    }

    fn planner(response: &str) -> ExecutionPlanner {
        ExecutionPlanner::new(Arc::new(ScriptedLlm(response.to_string())), &registry())
    }

    #[test]
    fn test_extract_json_object_simple() {
        let input = r#"{"steps":[]}"#;
        assert_eq!(extract_json_object(input), Some(input));
    }

    #[test]
    fn test_extract_json_object_with_text() {
        let input = r#"Here is the plan: {"steps":[]} Done!"#;
        assert_eq!(extract_json_object(input), Some(r#"{"steps":[]}"#));
    }

    #[test]
    fn test_extract_json_object_nested() {
        let input = r#"{"steps":[{"parameters":{"a":1}}]}"#;
        assert_eq!(extract_json_object(input), Some(input));
    }

    #[test]
    fn test_extract_json_object_incomplete() {
        assert_eq!(extract_json_object(r#"{"steps":["#), None);
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[tokio::test]
    async fn valid_plan_is_parsed() {
        let response = r#"{
            "steps": [
                {"agent": "sql", "description": "Query active alerts", "parameters": {"status": "active"}},
                {"agent": "api", "description": "Fetch service status", "tool_name": "get_service_status"}
            ],
            "estimated_complexity": 4
        }"#;

        let plan = planner(response)
            .create_plan("alerts and service status", None)
            .await;

        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].agent_kind, AgentKind::Sql);
        assert_eq!(plan.steps[1].agent_kind, AgentKind::Api);
        assert_eq!(plan.steps[1].tool_name.as_deref(), Some("get_service_status"));
        assert_eq!(plan.estimated_complexity, 4);
        assert!(plan.requires_consolidation);
    }

    #[tokio::test]
    async fn agent_kind_is_normalized() {
        let response = r#"{"steps": [{"agent": " SQL ", "description": "query"}]}"#;
        let plan = planner(response).create_plan("query alerts", None).await;

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].agent_kind, AgentKind::Sql);
    }

    #[tokio::test]
    async fn unknown_agent_kind_triggers_fallback() {
        let response = r#"{"steps": [{"agent": "graphql", "description": "query"}]}"#;
        let plan = planner(response)
            .create_plan("show service status and uptime", None)
            .await;

        // Fallback: one step, routed by keyword overlap to the api source.
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].agent_kind, AgentKind::Api);
        assert!(!plan.requires_consolidation);
    }

    #[tokio::test]
    async fn empty_steps_trigger_fallback() {
        let plan = planner(r#"{"steps": []}"#)
            .create_plan("list database alerts", None)
            .await;

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].agent_kind, AgentKind::Sql);
    }

    #[tokio::test]
    async fn non_json_response_triggers_fallback() {
        let plan = planner("I cannot produce a plan for this.")
            .create_plan("asset details for pump-7", None)
            .await;

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].agent_kind, AgentKind::Soap);
    }

    #[tokio::test]
    async fn forward_dependency_triggers_fallback() {
        let response = r#"{"steps": [
            {"agent": "sql", "description": "first", "depends_on": [1]},
            {"agent": "api", "description": "second"}
        ]}"#;
        let plan = planner(response).create_plan("database records", None).await;

        assert_eq!(plan.steps.len(), 1);
    }

    #[tokio::test]
    async fn complexity_is_clamped_from_llm_output() {
        let response = r#"{"steps": [{"agent": "sql", "description": "q"}], "estimated_complexity": 99}"#;
        let plan = planner(response).create_plan("q", None).await;
        assert_eq!(plan.estimated_complexity, 10);
    }

    #[tokio::test]
    async fn fallback_with_no_keyword_match_defaults_to_first_source() {
        let plan = planner("garbage")
            .create_plan("completely unrelated text", None)
            .await;

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].agent_kind, AgentKind::Sql);
    }

    #[test]
    fn overlap_scoring_counts_keywords_and_tokens() {
        let tool = ToolMetadata::new("get_service_status", "api", "Fetch live service status")
            .with_keywords(vec!["uptime".into()]);

        // "service" (name token + description token) and "status" count,
        // "uptime" keyword counts.
        let score = overlap_score(&tool, "what is the uptime status of the billing service");
        assert!(score >= 3);

        assert_eq!(overlap_score(&tool, "database alerts"), 0);
    }
}
