//! LLM completion boundary for Tributary.
//!
//! Everything downstream of this crate treats the completion service as
//! a black box behind the [`LlmClient`] trait: messages plus an optional
//! tool schema in, text plus zero-or-more tool calls out. Providers for
//! OpenAI-compatible endpoints and Anthropic are included, along with
//! retry and concurrency-limiting wrappers and a TOML-loadable config.

pub mod anthropic;
pub mod client;
pub mod config;
pub mod openai;
pub mod retry;

pub use anthropic::AnthropicClient;
pub use client::{
    ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage, ToolCall, ToolSchema,
};
pub use config::{build_llm_client, LlmConfig, SemaphoredClient};
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
