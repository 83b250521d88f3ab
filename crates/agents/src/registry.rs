//! Tool and agent registries.
//!
//! Both registries follow a construct-then-freeze discipline: they are
//! populated during startup wiring and then shared immutably (via
//! `Arc`) with the engine. Registration is not expected to race with
//! lookup in steady state.

use crate::traits::Agent;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use tributary_common::{AgentKind, ToolMetadata};

/// Static mapping of tool name to tool metadata.
#[derive(Debug, Clone, Default)]
pub struct ToolCapabilityRegistry {
    tools: HashMap<String, ToolMetadata>,
}

impl ToolCapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: Vec<ToolMetadata>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool. An existing entry under the same name is
    /// overwritten with a warning.
    pub fn register(&mut self, tool: ToolMetadata) {
        if self.tools.contains_key(&tool.tool_name) {
            warn!(tool_name = %tool.tool_name, "Overwriting existing tool registration");
        }
        self.tools.insert(tool.tool_name.clone(), tool);
    }

    pub fn get(&self, tool_name: &str) -> Option<&ToolMetadata> {
        self.tools.get(tool_name)
    }

    pub fn unregister(&mut self, tool_name: &str) -> Option<ToolMetadata> {
        self.tools.remove(tool_name)
    }

    pub fn clear(&mut self) {
        self.tools.clear();
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Snapshot of all registered tools, ordered by name.
    pub fn list(&self) -> Vec<ToolMetadata> {
        let mut tools: Vec<_> = self.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
        tools
    }

    /// Copy out the tools whose `data_source` matches exactly
    /// (case-sensitive). An unmatched filter yields an empty set — the
    /// caller decides whether that is an error.
    pub fn filter_by_source(&self, data_source: &str) -> Vec<ToolMetadata> {
        let mut tools: Vec<_> = self
            .tools
            .values()
            .filter(|t| t.data_source == data_source)
            .cloned()
            .collect();
        tools.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
        tools
    }
}

/// Mapping of agent kind to agent instance.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentKind, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its own kind. An existing entry is
    /// overwritten with a warning.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        let kind = agent.kind();
        if self.agents.contains_key(&kind) {
            warn!(agent_kind = %kind, "Overwriting existing agent registration");
        }
        self.agents.insert(kind, agent);
    }

    pub fn get(&self, kind: AgentKind) -> Option<Arc<dyn Agent>> {
        self.agents.get(&kind).cloned()
    }

    pub fn unregister(&mut self, kind: AgentKind) -> Option<Arc<dyn Agent>> {
        self.agents.remove(&kind)
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Registered kinds, in the canonical sql/api/soap order.
    pub fn kinds(&self) -> Vec<AgentKind> {
        AgentKind::ALL
            .into_iter()
            .filter(|kind| self.agents.contains_key(kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use tributary_common::AgentResult;

    fn tool(name: &str, source: &str) -> ToolMetadata {
        ToolMetadata::new(name, source, format!("{name} description"))
    }

    struct StubAgent(AgentKind);

    #[async_trait]
    impl Agent for StubAgent {
        fn kind(&self) -> AgentKind {
            self.0
        }

        fn system_prompt(&self) -> &str {
            "stub"
        }

        async fn execute(
            &self,
            query: &str,
            _context: Option<&str>,
            _parameters: &HashMap<String, Value>,
        ) -> AgentResult {
            AgentResult::degraded(self.0, "stub", query, None, 0)
        }
    }

    #[test]
    fn register_get_unregister() {
        let mut registry = ToolCapabilityRegistry::new();
        registry.register(tool("query_database", "sql"));

        assert_eq!(registry.len(), 1);
        assert!(registry.get("query_database").is_some());
        assert!(registry.get("missing").is_none());

        let removed = registry.unregister("query_database");
        assert!(removed.is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn register_overwrites_existing() {
        let mut registry = ToolCapabilityRegistry::new();
        registry.register(tool("query_database", "sql"));
        registry.register(ToolMetadata::new(
            "query_database",
            "sql",
            "updated description",
        ));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("query_database").map(|t| t.description.clone()),
            Some("updated description".to_string())
        );
    }

    #[test]
    fn filter_is_exact_and_case_sensitive() {
        let mut registry = ToolCapabilityRegistry::new();
        registry.register(tool("query_database", "sql"));
        registry.register(tool("get_service_status", "api"));
        registry.register(tool("fetch_asset_details", "soap"));

        assert_eq!(registry.filter_by_source("sql").len(), 1);
        assert_eq!(registry.filter_by_source("SQL").len(), 0);
        assert_eq!(registry.filter_by_source("graphql").len(), 0);
    }

    #[test]
    fn filter_copies_do_not_mutate_registry() {
        let mut registry = ToolCapabilityRegistry::new();
        registry.register(tool("query_database", "sql"));

        let mut filtered = registry.filter_by_source("sql");
        filtered[0].description = "mutated".to_string();

        assert_eq!(
            registry.get("query_database").map(|t| t.description.clone()),
            Some("query_database description".to_string())
        );
    }

    #[test]
    fn list_is_sorted_snapshot() {
        let mut registry = ToolCapabilityRegistry::new();
        registry.register(tool("zeta", "api"));
        registry.register(tool("alpha", "sql"));

        let names: Vec<_> = registry.list().into_iter().map(|t| t.tool_name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn agent_registry_register_and_lookup() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(StubAgent(AgentKind::Sql)));
        registry.register(Arc::new(StubAgent(AgentKind::Api)));

        assert_eq!(registry.len(), 2);
        assert!(registry.get(AgentKind::Sql).is_some());
        assert!(registry.get(AgentKind::Soap).is_none());
        assert_eq!(registry.kinds(), vec![AgentKind::Sql, AgentKind::Api]);
    }

    #[test]
    fn agent_registry_overwrite_and_clear() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(StubAgent(AgentKind::Sql)));
        registry.register(Arc::new(StubAgent(AgentKind::Sql)));
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }
}
