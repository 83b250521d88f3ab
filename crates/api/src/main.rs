//! Tributary API server binary.
//!
//! Usage:
//!   tributary-api --config config.toml
//!   tributary-api --config config.toml --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `TRIBUTARY_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` - LLM provider keys
//!
//! The binary wires the engine with placeholder adapters; deployments
//! embed the library and register their own [`DataAdapter`]
//! implementations for the SQL/REST/SOAP backends.

use async_trait::async_trait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tributary_agents::{
    AgentRegistry, DataAdapter, RestAgent, SoapAgent, SqlAgent, ToolCapabilityRegistry,
};
use tributary_api::{serve, AppState};
use tributary_common::{Result, TributaryError};
use tributary_engine::{EngineConfig, WorkflowEngine};
use tributary_llm::build_llm_client;

/// Placeholder adapter for data sources that have not been wired.
/// Every call fails, which the agent layer converts into an
/// error-shaped result, so the engine still completes turns.
struct UnwiredAdapter(&'static str);

#[async_trait]
impl DataAdapter for UnwiredAdapter {
    fn data_source(&self) -> &str {
        self.0
    }

    async fn execute(&self, operation: &str, _params: &Value) -> Result<Value> {
        Err(TributaryError::Adapter(format!(
            "no adapter wired for data source '{}' (operation '{operation}')",
            self.0
        )))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tributary_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments (simple for now)
    let args: Vec<String> = std::env::args().collect();
    let mut port: u16 = 8080;
    let mut config_path: Option<String> = None;
    let mut bind_addr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().expect("Invalid port number");
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    bind_addr = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tributary API Server");
                println!();
                println!("Usage: tributary-api [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --port <PORT>        Port to listen on (default: 8080)");
                println!(
                    "  -b, --bind <ADDR>        Bind address (default: 127.0.0.1, env: TRIBUTARY_BIND_ADDR)"
                );
                println!("  -c, --config <FILE>      Path to config.toml file");
                println!("  -h, --help               Show this help message");
                println!();
                println!("Environment variables:");
                println!("  TRIBUTARY_BIND_ADDR      Server bind address (overridden by --bind flag)");
                println!("  OPENAI_API_KEY           OpenAI API key");
                println!("  ANTHROPIC_API_KEY        Anthropic API key");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let host = bind_addr
        .or_else(|| std::env::var("TRIBUTARY_BIND_ADDR").ok())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    if host == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 — this exposes the API to all network interfaces. \
             Ensure a firewall or reverse proxy is in place."
        );
    }

    // Load engine configuration
    let config = config_path
        .map(|path| {
            tracing::info!(path = %path, "Loading configuration");
            EngineConfig::from_file(&path)
        })
        .transpose()?
        .unwrap_or_else(|| {
            tracing::warn!("No --config given, starting with an empty tool catalog");
            EngineConfig {
                llm: tributary_llm::LlmConfig {
                    provider: "openai".into(),
                    model: "llama3".into(),
                    api_key: None,
                    api_url: None,
                    temperature: None,
                    max_tokens: None,
                    max_concurrent_requests: 2,
                    retry: Default::default(),
                },
                tools: Vec::new(),
                max_steps_per_turn: 16,
            }
        });

    // Construct-then-freeze wiring: registries are built once here and
    // shared immutably with the engine.
    let llm = build_llm_client(&config.llm)?;
    let tools = ToolCapabilityRegistry::from_tools(config.tools.clone());

    tracing::warn!(
        "Using unwired placeholder adapters; embed the library and register real \
         DataAdapter implementations to serve live data"
    );

    let mut agents = AgentRegistry::new();
    agents.register(Arc::new(SqlAgent::new(
        llm.clone(),
        Arc::new(UnwiredAdapter("sql")),
        &tools,
    )));
    agents.register(Arc::new(RestAgent::new(
        llm.clone(),
        Arc::new(UnwiredAdapter("api")),
        &tools,
    )));
    agents.register(Arc::new(SoapAgent::new(
        llm.clone(),
        Arc::new(UnwiredAdapter("soap")),
        &tools,
    )));
    let agent_kinds = agents.kinds();

    let engine = Arc::new(WorkflowEngine::new(
        llm,
        &tools,
        Arc::new(agents),
        config.max_steps_per_turn,
    ));

    tracing::info!(
        tools = tools.len(),
        agents = agent_kinds.len(),
        "Engine initialized"
    );

    let state = Arc::new(AppState::new(engine, agent_kinds));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    serve(state, addr).await?;

    Ok(())
}
