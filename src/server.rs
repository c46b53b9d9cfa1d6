//! WebSocket endpoint: one reader and one writer task per connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::path::Path;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::session::SessionId;
use crate::signal::{ClientMessage, ServerMessage};

pub const SIGNALING_PATH: &str = "/ws";

/// Signaling route, plus the static directory as fallback when given.
pub fn app(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new().route(SIGNALING_PATH, get(ws_handler));
    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };
    router
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = SessionId::generate();
    info!("client {} connected", session_id.short());

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.connect(session_id.clone(), tx).await;

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode {}: {}", msg.kind(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_id = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => recv_state.handle_message(&recv_id, msg).await,
                    Err(e) => warn!("ignoring malformed frame from {}: {}", recv_id.short(), e),
                },
                Message::Close(_) => break,
                other => debug!("ignoring non-text frame from {}: {:?}", recv_id.short(), other),
            }
        }
    });

    // Whichever side finishes first tears the other down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.disconnect(&session_id).await;
    info!("client {} disconnected", session_id.short());
}
