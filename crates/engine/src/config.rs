//! Engine configuration.

use serde::{Deserialize, Serialize};
use tributary_common::ToolMetadata;
use tributary_llm::LlmConfig;

fn default_max_steps() -> usize {
    16
}

/// Top-level engine configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// LLM provider settings
    pub llm: LlmConfig,

    /// Static tool catalog registered at startup
    #[serde(default)]
    pub tools: Vec<ToolMetadata>,

    /// Upper bound on dispatched steps per turn
    #[serde(default = "default_max_steps")]
    pub max_steps_per_turn: usize,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
max_steps_per_turn = 8

[llm]
provider = "openai"
model = "llama3"
api_url = "http://localhost:11434"

[[tools]]
tool_name = "query_database"
data_source = "sql"
description = "Run read-only database queries"
capabilities = ["read"]
keywords = ["alert", "database"]

[[tools]]
tool_name = "get_service_status"
data_source = "api"
description = "Fetch live service status"
"#;

    #[test]
    fn deserialize_full_config() {
        let config: EngineConfig = toml::from_str(TOML_CONFIG).unwrap();

        assert_eq!(config.max_steps_per_turn, 8);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.tools.len(), 2);
        assert_eq!(config.tools[0].tool_name, "query_database");
        assert_eq!(config.tools[0].keywords, vec!["alert", "database"]);
        // Optional tool fields default to empty.
        assert!(config.tools[1].capabilities.is_empty());
    }

    #[test]
    fn max_steps_defaults_when_absent() {
        let toml_str = r#"
[llm]
provider = "openai"
model = "llama3"
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_steps_per_turn, 16);
        assert!(config.tools.is_empty());
    }
}
