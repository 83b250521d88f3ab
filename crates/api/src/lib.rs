//! HTTP/WebSocket gateway for the Tributary engine.
//!
//! This crate exposes the engine to external clients. The transport is
//! deliberately thin: it parses requests, hands them to
//! [`WorkflowEngine`](tributary_engine::WorkflowEngine), and serializes
//! outcomes or streamed progress events back out.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/v1/query` - Run one turn to completion
//! - `WS /api/v1/ws` - Stream per-node progress events for a turn

pub mod routes;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/query", post(routes::query))
        .route("/api/v1/ws", get(routes::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(%addr, "Starting Tributary API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
