//! HTTP route handlers for the API.

use crate::AppState;
use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tributary_common::{AgentKind, PerformanceMetrics};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub agents: Vec<AgentKind>,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        agents: state.agent_kinds.clone(),
    })
}

/// Query request body.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Reuse a session to continue an earlier conversation
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Query response body.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub session_id: String,
    pub final_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consolidated_data: Option<Value>,
    pub errors: Vec<String>,
    pub performance_metrics: PerformanceMetrics,
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code {
            "EMPTY_QUERY" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Run one turn end to end and return the outcome.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ErrorResponse> {
    if request.query.trim().is_empty() {
        return Err(ErrorResponse {
            error: "query must not be empty".into(),
            code: "EMPTY_QUERY",
        });
    }

    let session_id = request
        .session_id
        .unwrap_or_else(|| format!("session_{}", uuid::Uuid::new_v4()));

    info!(
        session_id = %session_id,
        query_preview = %request.query.chars().take(50).collect::<String>(),
        "Received query"
    );

    let prior_state = state.sessions.read().await.get(&session_id).cloned();

    let outcome = state
        .engine
        .run_turn(&request.query, &session_id, prior_state)
        .await;

    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), outcome.state);

    Ok(Json(QueryResponse {
        session_id,
        final_response: outcome.final_response,
        consolidated_data: outcome.consolidated_data,
        errors: outcome.errors,
        performance_metrics: outcome.performance_metrics,
    }))
}

/// WebSocket handler streaming turn progress events.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Drive one streamed turn per incoming query frame.
///
/// The client sends `{"query": "...", "session_id": "..."}` as a text
/// frame; every workflow event is forwarded back as a JSON frame, and a
/// closing `{"done": true}` frame marks turn completion. Dropping the
/// connection cancels the in-flight turn between steps.
async fn handle_websocket(mut socket: axum::extract::ws::WebSocket, state: Arc<AppState>) {
    use axum::extract::ws::Message;

    info!("WebSocket connection established");

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let request: QueryRequest = match serde_json::from_str(msg.as_str()) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Ignoring malformed WebSocket frame");
                let frame = serde_json::json!({"error": format!("malformed request: {e}")});
                if socket
                    .send(Message::Text(frame.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        let session_id = request
            .session_id
            .unwrap_or_else(|| format!("session_{}", uuid::Uuid::new_v4()));
        let cancel = CancellationToken::new();

        let mut events = state.engine.stream_turn(
            request.query.clone(),
            session_id.clone(),
            None,
            cancel.clone(),
        );

        let mut client_gone = false;
        while let Some(event) = events.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize workflow event");
                    continue;
                }
            };
            if socket.send(Message::Text(frame.into())).await.is_err() {
                // Client went away; stop dispatching further steps.
                cancel.cancel();
                client_gone = true;
                break;
            }
        }

        if client_gone {
            break;
        }

        let done = serde_json::json!({"done": true, "session_id": session_id});
        if socket
            .send(Message::Text(done.to_string().into()))
            .await
            .is_err()
        {
            break;
        }
    }

    debug!("WebSocket connection closed");
}
