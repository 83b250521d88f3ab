//! Tool metadata and the closed set of agent kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The data sources Tributary can dispatch to.
///
/// Each variant is bound to exactly one agent and one adapter. The
/// lowercase string form is the canonical `data_source` value used by
/// tool metadata and by the capability filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Relational database retrieval
    Sql,
    /// REST service retrieval
    Api,
    /// SOAP service retrieval
    Soap,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Sql, AgentKind::Api, AgentKind::Soap];

    /// Canonical data-source string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Sql => "sql",
            AgentKind::Api => "api",
            AgentKind::Soap => "soap",
        }
    }

    /// Parse a data-source string. Matching is exact and case-sensitive;
    /// callers that accept free-form input normalize before calling.
    pub fn from_source(source: &str) -> Option<Self> {
        match source {
            "sql" => Some(AgentKind::Sql),
            "api" => Some(AgentKind::Api),
            "soap" => Some(AgentKind::Soap),
            _ => None,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one retrieval tool.
///
/// Loaded once at startup and registered into the
/// `ToolCapabilityRegistry`; filtering copies these records and never
/// mutates the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Unique tool name, as exposed to the LLM tool schema
    pub tool_name: String,

    /// Data source this tool belongs to ("sql", "api", "soap")
    pub data_source: String,

    /// Human-readable description, also used for keyword routing
    pub description: String,

    /// Capability tags (e.g. "read", "aggregate")
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Routing keywords matched against user queries
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ToolMetadata {
    pub fn new(
        tool_name: impl Into<String>,
        data_source: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            data_source: data_source.into(),
            description: description.into(),
            capabilities: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&AgentKind::Sql).unwrap(), "\"sql\"");
        assert_eq!(serde_json::to_string(&AgentKind::Api).unwrap(), "\"api\"");
        assert_eq!(serde_json::to_string(&AgentKind::Soap).unwrap(), "\"soap\"");
    }

    #[test]
    fn from_source_is_case_sensitive() {
        assert_eq!(AgentKind::from_source("sql"), Some(AgentKind::Sql));
        assert_eq!(AgentKind::from_source("SQL"), None);
        assert_eq!(AgentKind::from_source("graphql"), None);
    }

    #[test]
    fn display_matches_as_str() {
        for kind in AgentKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn tool_metadata_builder() {
        let tool = ToolMetadata::new("query_database", "sql", "Run read-only queries")
            .with_capabilities(vec!["read".into()])
            .with_keywords(vec!["alert".into(), "database".into()]);

        assert_eq!(tool.tool_name, "query_database");
        assert_eq!(tool.data_source, "sql");
        assert_eq!(tool.capabilities, vec!["read".to_string()]);
        assert_eq!(tool.keywords.len(), 2);
    }

    #[test]
    fn tool_metadata_deserializes_with_defaults() {
        let toml_str = r#"
tool_name = "get_service_status"
data_source = "api"
description = "Fetch service status from the monitoring REST API"
"#;
        let tool: ToolMetadata = toml::from_str(toml_str).unwrap();
        assert!(tool.capabilities.is_empty());
        assert!(tool.keywords.is_empty());
    }
}
