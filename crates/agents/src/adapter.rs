//! External data-adapter boundary.

use async_trait::async_trait;
use serde_json::Value;
use tributary_common::Result;

/// The wire client for one data source (SQL driver, REST client, SOAP
/// client). Tributary never talks to a backend directly; agents invoke
/// adapters with the tool name the LLM selected and the arguments it
/// produced, and get back a structured result.
///
/// Adapter errors are plain `Err` values here; the agent layer converts
/// them into error-shaped results.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    /// The data source this adapter serves ("sql", "api", "soap").
    fn data_source(&self) -> &str;

    /// Execute one operation against the backend.
    async fn execute(&self, operation: &str, params: &Value) -> Result<Value>;
}

#[async_trait]
impl DataAdapter for Box<dyn DataAdapter> {
    fn data_source(&self) -> &str {
        (**self).data_source()
    }

    async fn execute(&self, operation: &str, params: &Value) -> Result<Value> {
        (**self).execute(operation, params).await
    }
}
