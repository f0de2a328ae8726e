//! HTTP and WebSocket routes for the Code Player server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{Html, IntoResponse, Json},
    routing::{get, post},
};
use codeplayer_core::{ControllerConfig, SandboxConfig, SourceBuffers, compose_static};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::ServerResult;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::PlaygroundSession;
use crate::share::{Snippet, SnippetStore};

/// Application state shared across handlers.
pub struct AppState {
    /// Shared snippets.
    pub store: Arc<dyn SnippetStore>,
    /// Timings for each session's controller.
    pub controller: ControllerConfig,
    /// Limits for each session's sandbox.
    pub sandbox: SandboxConfig,
}

/// Body of `POST /api/code/save`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    #[serde(flatten)]
    pub sources: SourceBuffers,
    /// Overwrite this snippet instead of creating one.
    #[serde(default)]
    pub share_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub share_id: String,
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/api/code/save", post(save_handler))
        .route("/api/code/shared/{share_id}", get(shared_handler))
        .route("/api/code/shared/{share_id}/preview", get(shared_preview_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Minimal built-in playground page.
async fn index_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Code Player</title>
    <style>
        body { font-family: system-ui, sans-serif; margin: 1rem; display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; }
        textarea { width: 100%; height: 8rem; font-family: monospace; }
        #console { background: #111827; color: #e5e7eb; padding: 0.5rem; min-height: 8rem; font-family: monospace; white-space: pre-wrap; }
        .warn { color: #facc15; } .error { color: #f87171; } .info { color: #60a5fa; }
    </style>
</head>
<body>
    <div>
        <textarea id="html" placeholder="HTML"></textarea>
        <textarea id="css" placeholder="CSS"></textarea>
        <textarea id="js" placeholder="JavaScript"></textarea>
        <button id="run">Run</button> <button id="clear">Clear</button> <button id="save">Save</button>
        <span id="share"></span>
    </div>
    <div>
        <pre id="preview"></pre>
        <div id="console">No console output yet...</div>
    </div>
    <script>
        const ws = new WebSocket(`ws://${location.host}/ws`);
        const send = (msg) => ws.send(JSON.stringify(msg));
        for (const kind of ['html', 'css', 'js']) {
            document.getElementById(kind).addEventListener('input', (e) =>
                send({ type: 'edit_source', kind, source: e.target.value }));
        }
        document.getElementById('run').onclick = () => send({ type: 'run' });
        document.getElementById('clear').onclick = () => send({ type: 'clear' });
        document.getElementById('save').onclick = () => send({ type: 'save' });
        ws.onmessage = (e) => {
            const msg = JSON.parse(e.data);
            if (msg.type === 'console_updated' || msg.type === 'session_state') {
                const el = document.getElementById('console');
                el.innerHTML = '';
                if (msg.logs.length === 0) el.textContent = 'No console output yet...';
                for (const log of msg.logs) {
                    const line = document.createElement('div');
                    line.className = log.kind;
                    line.textContent = `[${log.timestamp}] ${log.message}`;
                    el.appendChild(line);
                }
            } else if (msg.type === 'preview_updated') {
                document.getElementById('preview').textContent = msg.document;
            } else if (msg.type === 'saved') {
                document.getElementById('share').textContent = `/api/code/shared/${msg.share_id}`;
            }
        };
    </script>
</body>
</html>"#,
    )
}

/// Health check handler.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Save a snippet.
async fn save_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveRequest>,
) -> ServerResult<Json<SaveResponse>> {
    let snippet = state.store.save(request.sources, request.share_id.as_deref())?;
    Ok(Json(SaveResponse {
        share_id: snippet.share_id,
    }))
}

/// Fetch a shared snippet.
async fn shared_handler(
    State(state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
) -> ServerResult<Json<Snippet>> {
    Ok(Json(state.store.load(&share_id)?))
}

/// Static, non-interactive preview of a shared snippet.
async fn shared_preview_handler(
    State(state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
) -> ServerResult<Html<String>> {
    let snippet = state.store.load(&share_id)?;
    Ok(Html(compose_static(&snippet.sources)))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection. The connection is one editing session.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut session = match PlaygroundSession::new(
        state.store.clone(),
        state.controller.clone(),
        state.sandbox.clone(),
    ) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to start session: {}", e);
            let msg = ServerMessage::Error {
                message: e.to_string(),
            };
            if let Ok(json) = serde_json::to_string(&msg) {
                let _ = sender.send(Message::Text(json.into())).await;
            }
            return;
        }
    };

    // Subscribe before anything can be broadcast.
    let mut rx = session.subscribe();

    // Send initial state
    if let Ok(json) = serde_json::to_string(&session.get_state()) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Forward server messages to client
    let forward_task = tokio::spawn(async move {
        loop {
            let msg = match rx.recv().await {
                Ok(msg) => msg,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Client lagged, skipped {} messages", skipped);
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            };
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming client messages
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match ClientMessage::parse(&text) {
                Ok(msg) => session.handle_message(msg),
                Err(e) => {
                    tracing::warn!("Failed to parse client message: {} (input: {})", e, text.as_str());
                    session.broadcast(ServerMessage::Error { message: e.to_string() });
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    forward_task.abort();
    tracing::debug!("Session closed");
}
