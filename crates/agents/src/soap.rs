//! SOAP agent - XML web-service retrieval.

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

const SOAP_SYSTEM_PROMPT: &str = r#"You are a SOAP web-service retrieval assistant. Your role is to:

1. Understand natural-language questions about enterprise records
2. Select the single most appropriate service operation for the question
3. Provide operation arguments matching the service contract
4. Identify records by their stable identifiers where possible

Only call read operations, never state-changing ones.
If no available operation can answer the question, say so briefly instead of guessing.
"#;

/// Agent for the SOAP data source.
pub struct SoapAgent {
    runner: ToolCallRunner,
}

impl SoapAgent {
    /// Build the agent with its capability-filtered tool snapshot.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        adapter: Arc<dyn DataAdapter>,
        tools: &ToolCapabilityRegistry,
    ) -> Self {
        let filtered = tools.filter_by_source(AgentKind::Soap.as_str());
        Self {
            runner: ToolCallRunner::new(llm, adapter, filtered),
        }
    }

    /// Adapters translate SOAP XML into JSON but keep the envelope
    /// nesting; the payload of interest lives under Envelope/Body.
    fn parse_payload(value: Value) -> Value {
        for path in ["/Envelope/Body", "/envelope/body"] {
            if let Some(body) = value.pointer(path) {
                return body.clone();
            }
        }
        value
    }
}

#[async_trait]
impl Agent for SoapAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Soap
    }

    fn system_prompt(&self) -> &str {
        SOAP_SYSTEM_PROMPT
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
    fn envelope_body_is_unwrapped() {
        let enveloped = json!({
            "Envelope": {
                "Body": {
                    "GetAssetResponse": {"asset_id": "pump-7", "status": "running"}
                }
            }
        });
        assert_eq!(
            SoapAgent::parse_payload(enveloped),
            json!({"GetAssetResponse": {"asset_id": "pump-7", "status": "running"}})
        );
    }

    #[test]
    fn lowercase_envelope_is_unwrapped() {
        let enveloped = json!({"envelope": {"body": {"result": 1}}});
        assert_eq!(SoapAgent::parse_payload(enveloped), json!({"result": 1}));
    }

    #[test]
    fn plain_payload_is_kept() {
        let payload = json!({"asset_id": "pump-7"});
        assert_eq!(SoapAgent::parse_payload(payload.clone()), payload);
    }
}
