//! Error types for Tributary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TributaryError {
    #[error("Planning error: {0}")]
    Planning(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Agent execution error: {0}")]
    AgentExecution(String),

    #[error("Consolidation error: {0}")]
    Consolidation(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Turn cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TributaryError>;
