//! Normalized result envelope produced by every agent invocation.

use crate::tool::AgentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Metadata attached to every agent result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// When the result was produced
    pub timestamp: DateTime<Utc>,

    /// The query the agent was asked to answer
    pub query: String,

    /// Step-level context, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Estimated number of rows/records in `data` (metrics only)
    pub row_count: u64,
}

/// The envelope an agent returns for one invocation.
///
/// Produced once, immutable, and appended to the matching per-source
/// list in the turn state. Failures are carried in `error` with `data`
/// null; they are never raised across the agent boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Which agent produced this result
    pub agent_kind: AgentKind,

    /// Tool that was invoked, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Result payload (null on error)
    pub data: Value,

    pub metadata: ResultMetadata,

    /// Error description when the invocation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock execution time, always recorded
    pub execution_time_ms: u64,
}

impl AgentResult {
    /// A successful result carrying tool output.
    pub fn success(
        agent_kind: AgentKind,
        tool_name: Option<String>,
        data: Value,
        query: impl Into<String>,
        context: Option<String>,
        execution_time_ms: u64,
    ) -> Self {
        let row_count = count_rows(&data);
        Self {
            agent_kind,
            tool_name,
            data,
            metadata: ResultMetadata {
                timestamp: Utc::now(),
                query: query.into(),
                context,
                row_count,
            },
            error: None,
            execution_time_ms,
        }
    }

    /// A degraded success: the LLM answered in text without calling a
    /// tool. Low confidence, but not an error.
    pub fn degraded(
        agent_kind: AgentKind,
        message: impl Into<String>,
        query: impl Into<String>,
        context: Option<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self::success(
            agent_kind,
            None,
            json!({ "message": message.into() }),
            query,
            context,
            execution_time_ms,
        )
    }

    /// An error-shaped result. `data` is null and `row_count` is 0.
    pub fn failure(
        agent_kind: AgentKind,
        error: impl Into<String>,
        query: impl Into<String>,
        context: Option<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            agent_kind,
            tool_name: None,
            data: Value::Null,
            metadata: ResultMetadata {
                timestamp: Utc::now(),
                query: query.into(),
                context,
                row_count: 0,
            },
            error: Some(error.into()),
            execution_time_ms,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Estimate how many records a payload holds. Used for metrics only,
/// never for control flow.
pub fn count_rows(value: &Value) -> u64 {
    match value {
        Value::Array(items) => items.len() as u64,
        Value::Object(map) => {
            for key in ["count", "total"] {
                if let Some(n) = map.get(key).and_then(Value::as_u64) {
                    return n;
                }
            }
            if map.is_empty() {
                0
            } else {
                1
            }
        }
        Value::Null => 0,
        _ => 1,
    }
}
