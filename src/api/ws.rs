//! WebSocket streaming of mission updates.
//!
//! Clients connect to `/api/missions/{id}/ws` after authenticating and
//! receive every event published for that mission as a JSON text frame.
//! Lagging clients that fall behind the broadcast buffer are resynced by
//! skipping the missed events.

use crate::types::AppError;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use tokio::sync::broadcast::error::RecvError;

pub async fn mission_updates(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    if !state.manager.mission_exists(&id) {
        return Err(AppError::NotFound(format!("Mission {} not found", id)));
    }

    Ok(ws.on_upgrade(move |socket| stream_updates(socket, state, id)))
}

async fn stream_updates(mut socket: WebSocket, state: AppState, mission_id: String) {
    let mut rx = state.bus.subscribe();

    loop {
        match rx.recv().await {
            Ok(event) => {
                if event.mission_id() != mission_id {
                    continue;
                }
                let payload = match serde_json::to_string(&event) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize mission event");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(mission_id = %mission_id, skipped, "WebSocket client lagged behind update stream");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
