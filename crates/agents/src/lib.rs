//! Data-retrieval agents for Tributary.
//!
//! This crate provides one capability-filtered executor per data source:
//!
//! - **SQL Agent**: read-only relational database retrieval
//! - **REST Agent**: HTTP/JSON service retrieval
//! - **SOAP Agent**: XML web-service retrieval
//!
//! All three share the same contract: build an enriched query, let the
//! LLM pick a tool from the agent's filtered schema, run the chosen tool
//! against the external adapter, and return a normalized
//! [`AgentResult`](tributary_common::AgentResult). Failures become data
//! on the result, never errors crossing the agent boundary.
//!
//! # Architecture
//!
//! ```text
//!               query + context + parameters
//!                          │
//!                          ▼
//!                 ┌─────────────────┐
//!                 │  Agent (sql /   │
//!                 │   rest / soap)  │
//!                 └────────┬────────┘
//!                          │ filtered tool schema
//!                          ▼
//!                 ┌─────────────────┐      ┌──────────────┐
//!                 │  ToolCallRunner │ ───► │  LlmClient   │
//!                 └────────┬────────┘      └──────────────┘
//!                          │ chosen tool + arguments
//!                          ▼
//!                 ┌─────────────────┐
//!                 │   DataAdapter   │  ◄── external wire client
//!                 └─────────────────┘
//! ```

pub mod adapter;
pub mod executor;
pub mod registry;
pub mod rest;
pub mod soap;
pub mod sql;
pub mod traits;

pub use adapter::DataAdapter;
pub use executor::ToolCallRunner;
pub use registry::{AgentRegistry, ToolCapabilityRegistry};
pub use rest::RestAgent;
pub use soap::SoapAgent;
pub use sql::SqlAgent;
pub use traits::Agent;
